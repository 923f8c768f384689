use crate::core::actor::ActorId;
use crate::core::currency::CurrencyCode;
use crate::core::error::{LedgerError, LedgerResult};
use crate::core::source::SourceRef;
use crate::ledger::payment::PaymentMethod;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Approval stage of a submission against a payable. Strictly forward:
/// Pending → Approved → Paid, no skipping, no going back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayableApprovalStatus {
    Pending,
    Approved,
    Paid,
}

impl fmt::Display for PayableApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PayableApprovalStatus::Pending => "pending",
            PayableApprovalStatus::Approved => "approved",
            PayableApprovalStatus::Paid => "paid",
        };
        write!(f, "{s}")
    }
}

/// An amount the agency owes a third party, settled over time through
/// approved [`PayablePayment`] submissions.
///
/// `balance` is denormalized for queryability but always re-derivable
/// as `amount - sum(paid submissions)`; the store maintains it on every
/// paid transition rather than patching it anywhere else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payable {
    id: Uuid,
    /// Payables may be standalone (e.g. office rent), so the source is
    /// optional — unlike receivables, which always have one.
    source: Option<SourceRef>,
    amount: Decimal,
    currency: CurrencyCode,
    balance: Decimal,
    deadline: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    canceled_at: Option<DateTime<Utc>>,
}

impl Payable {
    /// Create a new payable with its full amount outstanding.
    ///
    /// # Panics
    ///
    /// Panics if `amount` is not positive; the store validates first.
    pub fn new(source: Option<SourceRef>, amount: Decimal, currency: CurrencyCode) -> Self {
        assert!(
            amount > Decimal::ZERO,
            "payable amount must be positive, got {}",
            amount
        );
        Self {
            id: Uuid::new_v4(),
            source,
            amount,
            currency,
            balance: amount,
            deadline: None,
            created_at: Utc::now(),
            canceled_at: None,
        }
    }

    /// Create a payable with a specific id (useful for testing / determinism).
    pub fn with_id(
        id: Uuid,
        source: Option<SourceRef>,
        amount: Decimal,
        currency: CurrencyCode,
    ) -> Self {
        assert!(amount > Decimal::ZERO);
        Self {
            id,
            source,
            amount,
            currency,
            balance: amount,
            deadline: None,
            created_at: Utc::now(),
            canceled_at: None,
        }
    }

    pub fn with_deadline(mut self, deadline: NaiveDate) -> Self {
        self.deadline = Some(deadline);
        self
    }

    // --- Accessors ---

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source(&self) -> Option<SourceRef> {
        self.source
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> &CurrencyCode {
        &self.currency
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn deadline(&self) -> Option<NaiveDate> {
        self.deadline
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled_at.is_some()
    }

    // --- Transitions (invariants enforced by the store) ---

    pub(crate) fn apply_paid(&mut self, amount: Decimal) {
        self.balance -= amount;
    }

    pub(crate) fn set_canceled(&mut self, at: DateTime<Utc>) {
        self.canceled_at = Some(at);
    }
}

/// A single submission against a payable, moving through the three-stage
/// approval workflow. Each transition stamps the acting staff member and
/// the time; stamps are never cleared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayablePayment {
    id: Uuid,
    payable_id: Uuid,
    amount: Decimal,
    method: PaymentMethod,
    reference: Option<String>,
    status: PayableApprovalStatus,
    submitted_by: ActorId,
    submitted_at: DateTime<Utc>,
    approved_by: Option<ActorId>,
    approved_at: Option<DateTime<Utc>>,
    paid_by: Option<ActorId>,
    paid_at: Option<DateTime<Utc>>,
}

impl PayablePayment {
    /// # Panics
    ///
    /// Panics if `amount` is not positive; the store validates first
    /// (including the availability check, which only it can make).
    pub fn new(
        payable_id: Uuid,
        amount: Decimal,
        method: PaymentMethod,
        submitted_by: ActorId,
    ) -> Self {
        assert!(
            amount > Decimal::ZERO,
            "submission amount must be positive, got {}",
            amount
        );
        Self {
            id: Uuid::new_v4(),
            payable_id,
            amount,
            method,
            reference: None,
            status: PayableApprovalStatus::Pending,
            submitted_by,
            submitted_at: Utc::now(),
            approved_by: None,
            approved_at: None,
            paid_by: None,
            paid_at: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    // --- Accessors ---

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn payable_id(&self) -> Uuid {
        self.payable_id
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn method(&self) -> PaymentMethod {
        self.method
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    pub fn status(&self) -> PayableApprovalStatus {
        self.status
    }

    pub fn submitted_by(&self) -> &ActorId {
        &self.submitted_by
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    pub fn approved_by(&self) -> Option<&ActorId> {
        self.approved_by.as_ref()
    }

    pub fn approved_at(&self) -> Option<DateTime<Utc>> {
        self.approved_at
    }

    pub fn paid_by(&self) -> Option<&ActorId> {
        self.paid_by.as_ref()
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    /// Still counted against the payable's availability.
    pub fn is_outstanding(&self) -> bool {
        matches!(
            self.status,
            PayableApprovalStatus::Pending | PayableApprovalStatus::Approved
        )
    }

    // --- Transitions ---

    /// Approve a pending submission. Approving anything else is an
    /// out-of-order call.
    pub fn approve(&mut self, by: ActorId, at: DateTime<Utc>) -> LedgerResult<()> {
        if self.status != PayableApprovalStatus::Pending {
            return Err(LedgerError::invalid_state(
                "payable payment",
                self.status,
                "approve",
            ));
        }
        self.status = PayableApprovalStatus::Approved;
        self.approved_by = Some(by);
        self.approved_at = Some(at);
        Ok(())
    }

    /// Mark an approved submission as paid. Approval cannot be skipped.
    pub fn mark_paid(&mut self, by: ActorId, at: DateTime<Utc>) -> LedgerResult<()> {
        if self.status != PayableApprovalStatus::Approved {
            return Err(LedgerError::invalid_state(
                "payable payment",
                self.status,
                "mark paid",
            ));
        }
        self.status = PayableApprovalStatus::Paid;
        self.paid_by = Some(by);
        self.paid_at = Some(at);
        Ok(())
    }
}

/// The amount still open for new submissions: the payable's balance less
/// everything committed to in-flight (pending or approved) submissions.
///
/// Must be recomputed from the live submission set on every check —
/// approval does not change it, paying does (through the balance).
pub fn available_for_new<'a>(
    balance: Decimal,
    submissions: impl IntoIterator<Item = &'a PayablePayment>,
) -> Decimal {
    let committed: Decimal = submissions
        .into_iter()
        .filter(|s| s.is_outstanding())
        .map(|s| s.amount())
        .sum();
    balance - committed
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn payable(amount: Decimal) -> Payable {
        Payable::new(None, amount, CurrencyCode::usd())
    }

    fn submission(p: &Payable, amount: Decimal) -> PayablePayment {
        PayablePayment::new(
            p.id(),
            amount,
            PaymentMethod::BankTransfer,
            ActorId::new("finance.amina"),
        )
    }

    #[test]
    fn test_new_payable_fully_outstanding() {
        let p = payable(dec!(1000));
        assert_eq!(p.balance(), dec!(1000));
        assert_eq!(available_for_new(p.balance(), std::iter::empty()), dec!(1000));
    }

    #[test]
    fn test_pending_submission_reduces_availability() {
        let p = payable(dec!(1000));
        let s = submission(&p, dec!(400));
        assert_eq!(available_for_new(p.balance(), [&s]), dec!(600));
    }

    #[test]
    fn test_approval_does_not_change_availability() {
        let p = payable(dec!(1000));
        let mut s = submission(&p, dec!(400));
        s.approve(ActorId::new("director.yusuf"), Utc::now()).unwrap();
        assert_eq!(available_for_new(p.balance(), [&s]), dec!(600));
    }

    #[test]
    fn test_paid_submission_releases_commitment_via_balance() {
        let mut p = payable(dec!(1000));
        let mut s = submission(&p, dec!(400));
        s.approve(ActorId::new("director.yusuf"), Utc::now()).unwrap();
        s.mark_paid(ActorId::new("finance.amina"), Utc::now()).unwrap();
        p.apply_paid(s.amount());

        assert_eq!(p.balance(), dec!(600));
        assert_eq!(available_for_new(p.balance(), [&s]), dec!(600));
    }

    #[test]
    fn test_cannot_approve_twice() {
        let p = payable(dec!(1000));
        let mut s = submission(&p, dec!(400));
        s.approve(ActorId::new("director.yusuf"), Utc::now()).unwrap();
        let err = s.approve(ActorId::new("director.yusuf"), Utc::now()).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidState { .. }));
    }

    #[test]
    fn test_cannot_pay_without_approval() {
        let p = payable(dec!(1000));
        let mut s = submission(&p, dec!(400));
        let err = s.mark_paid(ActorId::new("finance.amina"), Utc::now()).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidState { .. }));
        assert_eq!(s.status(), PayableApprovalStatus::Pending);
    }

    #[test]
    fn test_cannot_pay_twice() {
        let p = payable(dec!(1000));
        let mut s = submission(&p, dec!(400));
        s.approve(ActorId::new("director.yusuf"), Utc::now()).unwrap();
        s.mark_paid(ActorId::new("finance.amina"), Utc::now()).unwrap();
        let err = s.mark_paid(ActorId::new("finance.amina"), Utc::now()).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidState { .. }));
    }

    #[test]
    fn test_stamps_recorded() {
        let p = payable(dec!(500));
        let mut s = submission(&p, dec!(500));
        assert_eq!(s.submitted_by().as_str(), "finance.amina");

        s.approve(ActorId::new("director.yusuf"), Utc::now()).unwrap();
        assert_eq!(s.approved_by().unwrap().as_str(), "director.yusuf");
        assert!(s.approved_at().is_some());

        s.mark_paid(ActorId::new("finance.amina"), Utc::now()).unwrap();
        assert_eq!(s.paid_by().unwrap().as_str(), "finance.amina");
        assert!(s.paid_at().is_some());
    }
}
