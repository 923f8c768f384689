use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The originating transaction a ledger row belongs to.
///
/// A receivable or payable always points at a single billable record in
/// one of the source modules. Modeling the reference as a sum type makes
/// "exactly one source is set" structural instead of a validation rule
/// over four nullable foreign keys.
///
/// # Examples
///
/// ```
/// use settlement_engine::core::source::{SourceKind, SourceRef};
/// use uuid::Uuid;
///
/// let source = SourceRef::Ticket(Uuid::new_v4());
/// assert_eq!(source.kind(), SourceKind::Ticket);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum SourceRef {
    Ticket(Uuid),
    Visa(Uuid),
    Cargo(Uuid),
    /// A Haj/Umrah booking.
    Booking(Uuid),
}

impl SourceRef {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceRef::Ticket(_) => SourceKind::Ticket,
            SourceRef::Visa(_) => SourceKind::Visa,
            SourceRef::Cargo(_) => SourceKind::Cargo,
            SourceRef::Booking(_) => SourceKind::Booking,
        }
    }

    /// Id of the referenced record in its source module.
    pub fn id(&self) -> Uuid {
        match self {
            SourceRef::Ticket(id)
            | SourceRef::Visa(id)
            | SourceRef::Cargo(id)
            | SourceRef::Booking(id) => *id,
        }
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

/// Source category, used to bucket revenue in period reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Ticket,
    Visa,
    Cargo,
    Booking,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceKind::Ticket => "ticket",
            SourceKind::Visa => "visa",
            SourceKind::Cargo => "cargo",
            SourceKind::Booking => "booking",
        };
        write!(f, "{s}")
    }
}
