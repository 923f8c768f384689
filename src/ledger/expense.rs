use crate::core::actor::ActorId;
use crate::core::currency::CurrencyCode;
use crate::core::error::{LedgerError, LedgerResult};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stage of an operating expense: Pending → Approved → Paid, with
/// Pending → Rejected as the only alternative exit. Every transition
/// is irreversible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseStatus {
    Pending,
    Approved,
    Paid,
    Rejected,
}

impl fmt::Display for ExpenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExpenseStatus::Pending => "pending",
            ExpenseStatus::Approved => "approved",
            ExpenseStatus::Paid => "paid",
            ExpenseStatus::Rejected => "rejected",
        };
        write!(f, "{s}")
    }
}

/// An operating expense moving through the two-stage approval workflow.
///
/// Structurally parallel to the payable workflow but simpler: the
/// expense itself is the unit of approval, so there is no sub-payment
/// entity and no availability pool to guard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    id: Uuid,
    description: String,
    amount: Decimal,
    currency: CurrencyCode,
    /// Business date of the expense, used for report bucketing.
    date: NaiveDate,
    status: ExpenseStatus,
    approved_by: Option<ActorId>,
    approved_at: Option<DateTime<Utc>>,
    rejected_by: Option<ActorId>,
    rejected_at: Option<DateTime<Utc>>,
    paid_by: Option<ActorId>,
    paid_at: Option<DateTime<Utc>>,
}

impl Expense {
    /// # Panics
    ///
    /// Panics if `amount` is not positive; the store validates first.
    pub fn new(
        description: impl Into<String>,
        amount: Decimal,
        currency: CurrencyCode,
        date: NaiveDate,
    ) -> Self {
        assert!(
            amount > Decimal::ZERO,
            "expense amount must be positive, got {}",
            amount
        );
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            amount,
            currency,
            date,
            status: ExpenseStatus::Pending,
            approved_by: None,
            approved_at: None,
            rejected_by: None,
            rejected_at: None,
            paid_by: None,
            paid_at: None,
        }
    }

    // --- Accessors ---

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> &CurrencyCode {
        &self.currency
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn status(&self) -> ExpenseStatus {
        self.status
    }

    pub fn approved_by(&self) -> Option<&ActorId> {
        self.approved_by.as_ref()
    }

    pub fn approved_at(&self) -> Option<DateTime<Utc>> {
        self.approved_at
    }

    pub fn rejected_by(&self) -> Option<&ActorId> {
        self.rejected_by.as_ref()
    }

    pub fn rejected_at(&self) -> Option<DateTime<Utc>> {
        self.rejected_at
    }

    pub fn paid_by(&self) -> Option<&ActorId> {
        self.paid_by.as_ref()
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    // --- Transitions ---

    pub fn approve(&mut self, by: ActorId, at: DateTime<Utc>) -> LedgerResult<()> {
        if self.status != ExpenseStatus::Pending {
            return Err(LedgerError::invalid_state("expense", self.status, "approve"));
        }
        self.status = ExpenseStatus::Approved;
        self.approved_by = Some(by);
        self.approved_at = Some(at);
        Ok(())
    }

    pub fn reject(&mut self, by: ActorId, at: DateTime<Utc>) -> LedgerResult<()> {
        if self.status != ExpenseStatus::Pending {
            return Err(LedgerError::invalid_state("expense", self.status, "reject"));
        }
        self.status = ExpenseStatus::Rejected;
        self.rejected_by = Some(by);
        self.rejected_at = Some(at);
        Ok(())
    }

    pub fn mark_paid(&mut self, by: ActorId, at: DateTime<Utc>) -> LedgerResult<()> {
        if self.status != ExpenseStatus::Approved {
            return Err(LedgerError::invalid_state(
                "expense",
                self.status,
                "mark paid",
            ));
        }
        self.status = ExpenseStatus::Paid;
        self.paid_by = Some(by);
        self.paid_at = Some(at);
        Ok(())
    }
}
