//! Atomic backing store for the settlement ledgers.
//!
//! Every mutation runs as one read-validate-write critical section under
//! the store's write lock. That single boundary is what makes the
//! availability check on payable submissions safe: two concurrent
//! submissions can never both observe the same stale balance, so
//! `available_for_new` cannot be driven negative (the sharpest invariant
//! in the subsystem). Reads take the shared lock.
//!
//! Nothing here retries. A failed mutation surfaces its
//! [`LedgerError`](crate::core::error::LedgerError) kind to the caller;
//! retrying a receipt or a submission without an idempotency key would
//! double count money, so retry decisions stay with the caller.

use crate::core::actor::ActorId;
use crate::core::currency::{CurrencyCode, RateTable};
use crate::core::error::{LedgerError, LedgerResult};
use crate::core::source::SourceRef;
use crate::ledger::expense::Expense;
use crate::ledger::payable::{available_for_new, Payable, PayablePayment};
use crate::ledger::payment::{Payment, PaymentMethod, PaymentStatus, Receipt, Settlement};
use chrono::{DateTime, NaiveDate, Utc};
use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

/// The full persisted state of one tenant's ledgers.
///
/// `BTreeMap` keys give every table a stable ascending-by-id iteration
/// order, which keeps report output reproducible for identical
/// snapshots. This struct is also the JSON snapshot format the CLI
/// loads and saves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub rates: RateTable,
    pub payments: BTreeMap<Uuid, Payment>,
    pub receipts: BTreeMap<Uuid, Receipt>,
    pub payables: BTreeMap<Uuid, Payable>,
    pub payable_payments: BTreeMap<Uuid, PayablePayment>,
    pub expenses: BTreeMap<Uuid, Expense>,
}

impl StoreSnapshot {
    /// Receipts belonging to a receivable, in id order.
    pub fn receipts_of(&self, payment_id: Uuid) -> Vec<&Receipt> {
        self.receipts
            .values()
            .filter(|r| r.payment_id() == payment_id)
            .collect()
    }

    /// Submissions belonging to a payable, in id order.
    pub fn submissions_of(&self, payable_id: Uuid) -> Vec<&PayablePayment> {
        self.payable_payments
            .values()
            .filter(|s| s.payable_id() == payable_id)
            .collect()
    }

    /// Derive a receivable's settlement position, preserving an explicit
    /// Credit marking while money is still outstanding.
    pub fn settlement_of(&self, payment: &Payment) -> Settlement {
        let receipts = self.receipts_of(payment.id());
        let mut settlement = Settlement::derive(
            payment.amount(),
            payment.currency(),
            &receipts,
            &self.rates,
        );
        if payment.status() == PaymentStatus::Credit && settlement.balance > Decimal::ZERO {
            settlement.status = PaymentStatus::Credit;
        }
        settlement
    }
}

/// Availability of a payable for new submissions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Availability {
    /// Amount minus everything already paid out.
    pub balance: Decimal,
    /// Total committed to pending or approved submissions.
    pub committed: Decimal,
    /// What a new submission may claim: `balance - committed`.
    pub available_for_new: Decimal,
}

/// Request/response backing store for one tenant.
///
/// # Examples
///
/// ```
/// use settlement_engine::core::currency::CurrencyCode;
/// use settlement_engine::core::source::SourceRef;
/// use settlement_engine::ledger::payment::{PaymentMethod, PaymentStatus};
/// use settlement_engine::store::SettlementStore;
/// use chrono::Utc;
/// use rust_decimal_macros::dec;
/// use uuid::Uuid;
///
/// let store = SettlementStore::new();
/// let payment_id = store
///     .create_payment(SourceRef::Ticket(Uuid::new_v4()), dec!(100), CurrencyCode::usd())
///     .unwrap();
///
/// let settlement = store
///     .record_receipt(payment_id, dec!(100), CurrencyCode::usd(), PaymentMethod::Cash, Utc::now())
///     .unwrap();
/// assert_eq!(settlement.status, PaymentStatus::Paid);
/// ```
#[derive(Debug, Default)]
pub struct SettlementStore {
    inner: RwLock<StoreSnapshot>,
}

impl SettlementStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            inner: RwLock::new(snapshot),
        }
    }

    /// Clone the full state, e.g. for reporting or persistence.
    pub fn snapshot(&self) -> StoreSnapshot {
        self.read().clone()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&*self.read())
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        Ok(Self::from_snapshot(serde_json::from_str(json)?))
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreSnapshot> {
        self.inner.read().expect("store lock poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreSnapshot> {
        self.inner.write().expect("store lock poisoned")
    }

    // --- Currency rates (owned by the settings module, consumed here) ---

    pub fn set_rate(&self, currency: CurrencyCode, rate: Decimal) -> LedgerResult<()> {
        self.write().rates.set_rate(currency, rate)
    }

    pub fn rates(&self) -> RateTable {
        self.read().rates.clone()
    }

    // --- Receivables ---

    pub fn create_payment(
        &self,
        source: SourceRef,
        amount: Decimal,
        currency: CurrencyCode,
    ) -> LedgerResult<Uuid> {
        ensure_positive(amount)?;
        let payment = Payment::new(source, amount, currency);
        let id = payment.id();
        self.write().payments.insert(id, payment);
        debug!("created receivable {id} for {source}");
        Ok(id)
    }

    /// Record a collection event and recompute the stored status from
    /// the full receipt set. An explicit Credit marking is cleared here:
    /// new money re-evaluates the receivable like any other.
    pub fn record_receipt(
        &self,
        payment_id: Uuid,
        amount: Decimal,
        currency: CurrencyCode,
        method: PaymentMethod,
        date: DateTime<Utc>,
    ) -> LedgerResult<Settlement> {
        ensure_positive(amount)?;
        let mut inner = self.write();

        let payment = inner
            .payments
            .get(&payment_id)
            .ok_or_else(|| LedgerError::not_found("payment", payment_id))?;
        if payment.is_canceled() {
            return Err(LedgerError::conflict("payment is canceled"));
        }

        let rate_to_base = if currency.is_usd() {
            None
        } else {
            Some(inner.rates.rate_for(&currency))
        };
        let receipt = Receipt::new(payment_id, amount, currency, rate_to_base, method, date);
        let receipt_id = receipt.id();
        inner.receipts.insert(receipt_id, receipt);

        let payment = &inner.payments[&payment_id];
        let settlement = Settlement::derive(
            payment.amount(),
            payment.currency(),
            &inner.receipts_of(payment_id),
            &inner.rates,
        );
        let status = settlement.status;
        inner
            .payments
            .get_mut(&payment_id)
            .expect("payment row checked above")
            .set_status(status);

        debug!("recorded receipt {receipt_id} against payment {payment_id}, now {status}");
        Ok(settlement)
    }

    /// Mark a receivable as credit (customer pays later, by
    /// `expected_date`). Legal only while money is still outstanding.
    pub fn mark_credit(&self, payment_id: Uuid, expected_date: NaiveDate) -> LedgerResult<()> {
        let mut inner = self.write();

        let payment = inner
            .payments
            .get(&payment_id)
            .ok_or_else(|| LedgerError::not_found("payment", payment_id))?;
        if payment.is_canceled() {
            return Err(LedgerError::conflict("payment is canceled"));
        }

        let settlement = inner.settlement_of(payment);
        if settlement.balance <= Decimal::ZERO {
            return Err(LedgerError::invalid_state(
                "payment",
                settlement.status,
                "mark as credit",
            ));
        }

        inner
            .payments
            .get_mut(&payment_id)
            .expect("payment row checked above")
            .set_credit(expected_date);
        debug!("marked payment {payment_id} as credit, expected {expected_date}");
        Ok(())
    }

    /// Soft-delete a receivable when its source record is canceled.
    /// Canceled rows are excluded from every balance and report figure.
    pub fn cancel_payment(&self, payment_id: Uuid) -> LedgerResult<()> {
        let mut inner = self.write();
        let payment = inner
            .payments
            .get_mut(&payment_id)
            .ok_or_else(|| LedgerError::not_found("payment", payment_id))?;
        if payment.is_canceled() {
            return Err(LedgerError::conflict("payment is already canceled"));
        }
        payment.set_canceled(Utc::now());
        debug!("canceled payment {payment_id}");
        Ok(())
    }

    /// The computed settlement position of a receivable.
    pub fn payment_balance(&self, payment_id: Uuid) -> LedgerResult<Settlement> {
        let inner = self.read();
        let payment = inner
            .payments
            .get(&payment_id)
            .ok_or_else(|| LedgerError::not_found("payment", payment_id))?;
        Ok(inner.settlement_of(payment))
    }

    pub fn get_payment(&self, payment_id: Uuid) -> LedgerResult<Payment> {
        self.read()
            .payments
            .get(&payment_id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("payment", payment_id))
    }

    /// Receipts of a receivable, most recent first (display order; the
    /// settlement total does not depend on it).
    pub fn receipts_for(&self, payment_id: Uuid) -> Vec<Receipt> {
        let inner = self.read();
        let mut receipts: Vec<Receipt> = inner
            .receipts_of(payment_id)
            .into_iter()
            .cloned()
            .collect();
        receipts.sort_by(|a, b| b.date().cmp(&a.date()));
        receipts
    }

    // --- Payables ---

    pub fn create_payable(
        &self,
        source: Option<SourceRef>,
        amount: Decimal,
        currency: CurrencyCode,
        deadline: Option<NaiveDate>,
    ) -> LedgerResult<Uuid> {
        ensure_positive(amount)?;
        let mut payable = Payable::new(source, amount, currency);
        if let Some(deadline) = deadline {
            payable = payable.with_deadline(deadline);
        }
        let id = payable.id();
        self.write().payables.insert(id, payable);
        debug!("created payable {id}");
        Ok(id)
    }

    /// Submit an amount for approval against a payable.
    ///
    /// The availability check and the insert happen inside one write
    /// section, so concurrent submissions are serialized and can never
    /// jointly overcommit the balance.
    pub fn submit_payable_payment(
        &self,
        payable_id: Uuid,
        amount: Decimal,
        method: PaymentMethod,
        reference: Option<String>,
        submitted_by: ActorId,
    ) -> LedgerResult<Uuid> {
        ensure_positive(amount)?;
        let mut inner = self.write();

        let payable = inner
            .payables
            .get(&payable_id)
            .ok_or_else(|| LedgerError::not_found("payable", payable_id))?;
        if payable.is_canceled() {
            return Err(LedgerError::conflict("payable is canceled"));
        }

        let available = available_for_new(payable.balance(), inner.submissions_of(payable_id));
        if amount > available {
            return Err(LedgerError::InsufficientBalance {
                requested: amount,
                available,
            });
        }

        let mut submission = PayablePayment::new(payable_id, amount, method, submitted_by);
        if let Some(reference) = reference {
            submission = submission.with_reference(reference);
        }
        let id = submission.id();
        inner.payable_payments.insert(id, submission);
        debug!("submitted {amount} against payable {payable_id} as {id}");
        Ok(id)
    }

    pub fn approve_payable_payment(&self, id: Uuid, approved_by: ActorId) -> LedgerResult<()> {
        let mut inner = self.write();
        let payable_id = inner
            .payable_payments
            .get(&id)
            .map(|s| s.payable_id())
            .ok_or_else(|| LedgerError::not_found("payable payment", id))?;
        if inner.payables[&payable_id].is_canceled() {
            return Err(LedgerError::conflict("payable is canceled"));
        }
        inner
            .payable_payments
            .get_mut(&id)
            .expect("submission row checked above")
            .approve(approved_by, Utc::now())?;
        debug!("approved payable payment {id}");
        Ok(())
    }

    /// Mark an approved submission as paid and settle it against the
    /// parent balance in the same write section.
    pub fn mark_payable_payment_paid(&self, id: Uuid, paid_by: ActorId) -> LedgerResult<()> {
        let mut inner = self.write();
        let (payable_id, amount) = inner
            .payable_payments
            .get(&id)
            .map(|s| (s.payable_id(), s.amount()))
            .ok_or_else(|| LedgerError::not_found("payable payment", id))?;
        if inner.payables[&payable_id].is_canceled() {
            return Err(LedgerError::conflict("payable is canceled"));
        }
        inner
            .payable_payments
            .get_mut(&id)
            .expect("submission row checked above")
            .mark_paid(paid_by, Utc::now())?;
        inner
            .payables
            .get_mut(&payable_id)
            .expect("parent payable checked above")
            .apply_paid(amount);
        debug!("paid payable payment {id}, balance reduced by {amount}");
        Ok(())
    }

    pub fn cancel_payable(&self, payable_id: Uuid) -> LedgerResult<()> {
        let mut inner = self.write();
        let payable = inner
            .payables
            .get_mut(&payable_id)
            .ok_or_else(|| LedgerError::not_found("payable", payable_id))?;
        if payable.is_canceled() {
            return Err(LedgerError::conflict("payable is already canceled"));
        }
        payable.set_canceled(Utc::now());
        debug!("canceled payable {payable_id}");
        Ok(())
    }

    pub fn payable_availability(&self, payable_id: Uuid) -> LedgerResult<Availability> {
        let inner = self.read();
        let payable = inner
            .payables
            .get(&payable_id)
            .ok_or_else(|| LedgerError::not_found("payable", payable_id))?;
        let balance = payable.balance();
        let available = available_for_new(balance, inner.submissions_of(payable_id));
        Ok(Availability {
            balance,
            committed: balance - available,
            available_for_new: available,
        })
    }

    pub fn get_payable(&self, payable_id: Uuid) -> LedgerResult<Payable> {
        self.read()
            .payables
            .get(&payable_id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("payable", payable_id))
    }

    pub fn get_payable_payment(&self, id: Uuid) -> LedgerResult<PayablePayment> {
        self.read()
            .payable_payments
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("payable payment", id))
    }

    // --- Expenses ---

    pub fn create_expense(
        &self,
        description: impl Into<String>,
        amount: Decimal,
        currency: CurrencyCode,
        date: NaiveDate,
    ) -> LedgerResult<Uuid> {
        ensure_positive(amount)?;
        let expense = Expense::new(description, amount, currency, date);
        let id = expense.id();
        self.write().expenses.insert(id, expense);
        debug!("created expense {id}");
        Ok(id)
    }

    pub fn approve_expense(&self, id: Uuid, approved_by: ActorId) -> LedgerResult<()> {
        self.with_expense(id, |e| e.approve(approved_by, Utc::now()))
    }

    pub fn reject_expense(&self, id: Uuid, rejected_by: ActorId) -> LedgerResult<()> {
        self.with_expense(id, |e| e.reject(rejected_by, Utc::now()))
    }

    pub fn mark_expense_paid(&self, id: Uuid, paid_by: ActorId) -> LedgerResult<()> {
        self.with_expense(id, |e| e.mark_paid(paid_by, Utc::now()))
    }

    pub fn get_expense(&self, id: Uuid) -> LedgerResult<Expense> {
        self.read()
            .expenses
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("expense", id))
    }

    fn with_expense(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut Expense) -> LedgerResult<()>,
    ) -> LedgerResult<()> {
        let mut inner = self.write();
        let expense = inner
            .expenses
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found("expense", id))?;
        f(expense)
    }
}

fn ensure_positive(amount: Decimal) -> LedgerResult<()> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::validation("amount must be positive"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn finance() -> ActorId {
        ActorId::new("finance.amina")
    }

    fn director() -> ActorId {
        ActorId::new("director.yusuf")
    }

    #[test]
    fn test_receipt_on_canceled_payment_conflicts() {
        let store = SettlementStore::new();
        let id = store
            .create_payment(SourceRef::Ticket(Uuid::new_v4()), dec!(100), CurrencyCode::usd())
            .unwrap();
        store.cancel_payment(id).unwrap();

        let err = store
            .record_receipt(id, dec!(50), CurrencyCode::usd(), PaymentMethod::Cash, Utc::now())
            .unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));
    }

    #[test]
    fn test_double_cancel_conflicts() {
        let store = SettlementStore::new();
        let id = store
            .create_payment(SourceRef::Visa(Uuid::new_v4()), dec!(100), CurrencyCode::usd())
            .unwrap();
        store.cancel_payment(id).unwrap();
        assert!(matches!(
            store.cancel_payment(id).unwrap_err(),
            LedgerError::Conflict(_)
        ));
    }

    #[test]
    fn test_non_positive_receipt_rejected() {
        let store = SettlementStore::new();
        let id = store
            .create_payment(SourceRef::Ticket(Uuid::new_v4()), dec!(100), CurrencyCode::usd())
            .unwrap();
        let err = store
            .record_receipt(id, dec!(0), CurrencyCode::usd(), PaymentMethod::Cash, Utc::now())
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn test_unknown_payment_not_found() {
        let store = SettlementStore::new();
        let err = store.payment_balance(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { .. }));
    }

    #[test]
    fn test_mark_credit_requires_outstanding_balance() {
        let store = SettlementStore::new();
        let id = store
            .create_payment(SourceRef::Booking(Uuid::new_v4()), dec!(100), CurrencyCode::usd())
            .unwrap();
        store
            .record_receipt(id, dec!(100), CurrencyCode::usd(), PaymentMethod::Cash, Utc::now())
            .unwrap();

        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let err = store.mark_credit(id, date).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidState { .. }));
    }

    #[test]
    fn test_credit_survives_reads_but_not_new_receipts() {
        let store = SettlementStore::new();
        let id = store
            .create_payment(SourceRef::Booking(Uuid::new_v4()), dec!(100), CurrencyCode::usd())
            .unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        store.mark_credit(id, date).unwrap();

        assert_eq!(store.payment_balance(id).unwrap().status, PaymentStatus::Credit);
        assert_eq!(store.get_payment(id).unwrap().expected_date(), Some(date));

        // A partial receipt re-evaluates the receivable like any other.
        let s = store
            .record_receipt(id, dec!(30), CurrencyCode::usd(), PaymentMethod::Cash, Utc::now())
            .unwrap();
        assert_eq!(s.status, PaymentStatus::Partial);
        assert_eq!(store.payment_balance(id).unwrap().status, PaymentStatus::Partial);
    }

    #[test]
    fn test_receipt_snapshots_live_rate() {
        let store = SettlementStore::new();
        store.set_rate(CurrencyCode::new("KES"), dec!(128)).unwrap();
        let id = store
            .create_payment(SourceRef::Ticket(Uuid::new_v4()), dec!(100), CurrencyCode::usd())
            .unwrap();
        store
            .record_receipt(
                id,
                dec!(12800),
                CurrencyCode::new("KES"),
                PaymentMethod::MobileMoney,
                Utc::now(),
            )
            .unwrap();

        // Later rate edits must not change the settled figure.
        store.set_rate(CurrencyCode::new("KES"), dec!(200)).unwrap();
        let s = store.payment_balance(id).unwrap();
        assert_eq!(s.total_received, dec!(100));
        assert_eq!(s.status, PaymentStatus::Paid);
    }

    #[test]
    fn test_submission_against_canceled_payable_conflicts() {
        let store = SettlementStore::new();
        let id = store
            .create_payable(None, dec!(1000), CurrencyCode::usd(), None)
            .unwrap();
        store.cancel_payable(id).unwrap();
        let err = store
            .submit_payable_payment(id, dec!(100), PaymentMethod::Cash, None, finance())
            .unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));
    }

    #[test]
    fn test_oversubmission_rejected() {
        let store = SettlementStore::new();
        let id = store
            .create_payable(None, dec!(1000), CurrencyCode::usd(), None)
            .unwrap();
        store
            .submit_payable_payment(id, dec!(400), PaymentMethod::BankTransfer, None, finance())
            .unwrap();

        let err = store
            .submit_payable_payment(id, dec!(700), PaymentMethod::BankTransfer, None, finance())
            .unwrap_err();
        match err {
            LedgerError::InsufficientBalance { requested, available } => {
                assert_eq!(requested, dec!(700));
                assert_eq!(available, dec!(600));
            }
            other => panic!("expected InsufficientBalance, got {other:?}"),
        }
    }

    #[test]
    fn test_paid_submission_reduces_parent_balance() {
        let store = SettlementStore::new();
        let id = store
            .create_payable(None, dec!(1000), CurrencyCode::usd(), None)
            .unwrap();
        let sub = store
            .submit_payable_payment(id, dec!(400), PaymentMethod::Cheque, None, finance())
            .unwrap();
        store.approve_payable_payment(sub, director()).unwrap();
        store.mark_payable_payment_paid(sub, finance()).unwrap();

        let availability = store.payable_availability(id).unwrap();
        assert_eq!(availability.balance, dec!(600));
        assert_eq!(availability.committed, Decimal::ZERO);
        assert_eq!(availability.available_for_new, dec!(600));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let store = SettlementStore::new();
        store.set_rate(CurrencyCode::new("KES"), dec!(128)).unwrap();
        let pay = store
            .create_payment(SourceRef::Cargo(Uuid::new_v4()), dec!(250), CurrencyCode::usd())
            .unwrap();
        store
            .record_receipt(pay, dec!(100), CurrencyCode::usd(), PaymentMethod::Card, Utc::now())
            .unwrap();
        store
            .create_payable(None, dec!(900), CurrencyCode::new("KES"), None)
            .unwrap();
        store
            .create_expense(
                "airport transfer",
                dec!(40),
                CurrencyCode::usd(),
                NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            )
            .unwrap();

        let json = store.to_json().unwrap();
        let restored = SettlementStore::from_json(&json).unwrap();

        let original = store.payment_balance(pay).unwrap();
        let recovered = restored.payment_balance(pay).unwrap();
        assert_eq!(original, recovered);
        assert_eq!(restored.rates().rate_for(&CurrencyCode::new("KES")), dec!(128));
    }
}
