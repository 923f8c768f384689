use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of the staff member who performed a workflow transition.
///
/// Permission checks (who may submit, approve, or pay) live with the
/// caller; the ledger only records which actor each stamp belongs to.
///
/// # Examples
///
/// ```
/// use settlement_engine::core::actor::ActorId;
///
/// let finance = ActorId::new("finance.amina");
/// let director = ActorId::new("director.yusuf");
/// assert_ne!(finance, director);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ActorId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
