use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Business-rule failures surfaced by the settlement engine.
///
/// Every variant maps to a caller-actionable condition. Storage or
/// transport failures are not modeled here; the in-memory store cannot
/// produce them, and a persistent backend would bubble its own error
/// type through a separate channel.
///
/// Nothing in this taxonomy is retried internally. Retrying a receipt
/// or a payable submission without an idempotency key would double
/// count money, so retry decisions belong to the caller.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Bad input shape or sign: non-positive amount, missing currency,
    /// an inverted date range.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Illegal transition given the entity's current status.
    #[error("cannot {action} {entity} in status {status}")]
    InvalidState {
        entity: &'static str,
        status: String,
        action: &'static str,
    },

    /// A submission would exceed the amount still available on the
    /// parent ledger row.
    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        requested: Decimal,
        available: Decimal,
    },

    /// Operating on a canceled entity.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Unknown id.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn invalid_state(
        entity: &'static str,
        status: impl ToString,
        action: &'static str,
    ) -> Self {
        Self::InvalidState {
            entity,
            status: status.to_string(),
            action,
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
