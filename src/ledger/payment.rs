use crate::core::currency::{CurrencyCode, RateTable};
use crate::core::source::SourceRef;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// How money changed hands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Card,
    Cheque,
    MobileMoney,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Card => "card",
            PaymentMethod::Cheque => "cheque",
            PaymentMethod::MobileMoney => "mobile_money",
        };
        write!(f, "{s}")
    }
}

/// Stored status of a receivable.
///
/// Pending, Partial and Paid are a cache of [`Settlement::derive`] over
/// the receipt set; Credit is the one explicitly set state (a customer
/// allowed to pay later, with an expected date). "Refund due" is never
/// stored: an overpaid receivable stays Paid and the overpayment shows
/// up as `refund_due` on the computed [`Settlement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Partial,
    Paid,
    Credit,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Credit => "credit",
        };
        write!(f, "{s}")
    }
}

/// An expected amount owed by a customer for a single billable source
/// record, collected over time through [`Receipt`]s.
///
/// One receivable exists per billable event; the source module creates
/// it together with the ticket, visa, cargo shipment or booking it
/// belongs to. Cancellation is soft (`canceled_at`) and excludes the
/// row from every balance and report computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    id: Uuid,
    source: SourceRef,
    /// The expected amount, in `currency`. Always positive.
    amount: Decimal,
    currency: CurrencyCode,
    status: PaymentStatus,
    /// Set when the receivable is marked as credit.
    expected_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    canceled_at: Option<DateTime<Utc>>,
}

impl Payment {
    /// Create a new receivable in status Pending.
    ///
    /// # Panics
    ///
    /// Panics if `amount` is not positive. Callers going through
    /// [`crate::store::SettlementStore`] get a `Validation` error instead.
    pub fn new(source: SourceRef, amount: Decimal, currency: CurrencyCode) -> Self {
        assert!(
            amount > Decimal::ZERO,
            "receivable amount must be positive, got {}",
            amount
        );
        Self {
            id: Uuid::new_v4(),
            source,
            amount,
            currency,
            status: PaymentStatus::Pending,
            expected_date: None,
            created_at: Utc::now(),
            canceled_at: None,
        }
    }

    /// Create a receivable with a specific id (useful for testing / determinism).
    pub fn with_id(id: Uuid, source: SourceRef, amount: Decimal, currency: CurrencyCode) -> Self {
        assert!(amount > Decimal::ZERO);
        Self {
            id,
            source,
            amount,
            currency,
            status: PaymentStatus::Pending,
            expected_date: None,
            created_at: Utc::now(),
            canceled_at: None,
        }
    }

    // --- Accessors ---

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source(&self) -> SourceRef {
        self.source
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> &CurrencyCode {
        &self.currency
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn expected_date(&self) -> Option<NaiveDate> {
        self.expected_date
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn canceled_at(&self) -> Option<DateTime<Utc>> {
        self.canceled_at
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled_at.is_some()
    }

    // --- Transitions (invariants enforced by the store) ---

    pub(crate) fn set_status(&mut self, status: PaymentStatus) {
        self.status = status;
    }

    pub(crate) fn set_credit(&mut self, expected_date: NaiveDate) {
        self.status = PaymentStatus::Credit;
        self.expected_date = Some(expected_date);
    }

    pub(crate) fn set_canceled(&mut self, at: DateTime<Utc>) {
        self.canceled_at = Some(at);
    }
}

/// A collection event against a receivable.
///
/// Receipts are immutable once created: they are financial events, and
/// "removal" of money owed happens by canceling the parent receivable,
/// never by editing history. When the receipt currency differs from USD
/// the live rate is captured into `rate_to_base` at record time, so the
/// receipt converts the same way forever regardless of later rate edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    id: Uuid,
    payment_id: Uuid,
    amount: Decimal,
    currency: CurrencyCode,
    /// Units of `currency` per 1 USD at record time, when captured.
    rate_to_base: Option<Decimal>,
    method: PaymentMethod,
    date: DateTime<Utc>,
}

impl Receipt {
    /// # Panics
    ///
    /// Panics if `amount` is not positive; the store validates first.
    pub fn new(
        payment_id: Uuid,
        amount: Decimal,
        currency: CurrencyCode,
        rate_to_base: Option<Decimal>,
        method: PaymentMethod,
        date: DateTime<Utc>,
    ) -> Self {
        assert!(
            amount > Decimal::ZERO,
            "receipt amount must be positive, got {}",
            amount
        );
        Self {
            id: Uuid::new_v4(),
            payment_id,
            amount,
            currency,
            rate_to_base,
            method,
            date,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn payment_id(&self) -> Uuid {
        self.payment_id
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> &CurrencyCode {
        &self.currency
    }

    pub fn rate_to_base(&self) -> Option<Decimal> {
        self.rate_to_base
    }

    pub fn method(&self) -> PaymentMethod {
        self.method
    }

    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }

    /// This receipt's value in `target`, the parent receivable's currency.
    ///
    /// Same-currency receipts pass through untouched. Cross-currency
    /// receipts go through USD, preferring the captured `rate_to_base`
    /// snapshot on the USD leg.
    pub fn value_in(&self, target: &CurrencyCode, rates: &RateTable) -> Decimal {
        if &self.currency == target {
            return self.amount;
        }
        let usd = rates.to_usd_with_snapshot(self.amount, &self.currency, self.rate_to_base);
        rates.from_usd(usd, target)
    }

    /// This receipt's value in USD, preferring the captured snapshot rate.
    pub fn value_in_usd(&self, rates: &RateTable) -> Decimal {
        rates.to_usd_with_snapshot(self.amount, &self.currency, self.rate_to_base)
    }
}

/// The computed settlement position of a receivable.
///
/// Status here is always the pure derivation; callers that need to
/// preserve an explicit Credit marking layer it on top (see
/// [`crate::store::SettlementStore::payment_balance`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub status: PaymentStatus,
    /// Expected amount minus total received, in the receivable's currency.
    /// Negative when overpaid.
    pub balance: Decimal,
    pub total_received: Decimal,
    /// |balance| when the receivable is overpaid, otherwise zero. A
    /// computed display state only; no refund transaction is modeled.
    pub refund_due: Decimal,
}

impl Settlement {
    /// Derive the settlement position from scratch.
    ///
    /// Pure function of (amount, currency, receipts, rates): summation
    /// is order-independent and recomputation always reproduces the
    /// same result for the same receipt set. Every mutation path goes
    /// through this rather than patching stored state incrementally.
    pub fn derive(
        amount: Decimal,
        currency: &CurrencyCode,
        receipts: &[&Receipt],
        rates: &RateTable,
    ) -> Self {
        let total_received: Decimal = receipts.iter().map(|r| r.value_in(currency, rates)).sum();
        let balance = amount - total_received;

        let status = if balance <= Decimal::ZERO {
            PaymentStatus::Paid
        } else if total_received > Decimal::ZERO {
            PaymentStatus::Partial
        } else {
            PaymentStatus::Pending
        };

        let refund_due = if balance < Decimal::ZERO {
            -balance
        } else {
            Decimal::ZERO
        };

        Self {
            status,
            balance,
            total_received,
            refund_due,
        }
    }

    pub fn is_overpaid(&self) -> bool {
        self.refund_due > Decimal::ZERO
    }
}
