use crate::core::error::{LedgerError, LedgerResult};
use crate::core::source::SourceKind;
use crate::ledger::expense::ExpenseStatus;
use crate::store::{SettlementStore, StoreSnapshot};
use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Bucket width for period reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Day,
    Month,
    Year,
}

impl Granularity {
    /// First day of the bucket containing `date`.
    fn bucket_start(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Day => date,
            Granularity::Month => date.with_day(1).expect("day 1 always valid"),
            Granularity::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1)
                .expect("january 1st always valid"),
        }
    }

    /// Start of the bucket after `start`.
    fn next_bucket(&self, start: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Day => start.succ_opt().expect("date range overflow"),
            Granularity::Month => start + Months::new(1),
            Granularity::Year => start + Months::new(12),
        }
    }

    fn label(&self, start: NaiveDate) -> String {
        match self {
            Granularity::Day => start.format("%Y-%m-%d").to_string(),
            Granularity::Month => start.format("%Y-%m").to_string(),
            Granularity::Year => start.format("%Y").to_string(),
        }
    }
}

impl FromStr for Granularity {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(Granularity::Day),
            "month" => Ok(Granularity::Month),
            "year" => Ok(Granularity::Year),
            other => Err(LedgerError::validation(format!(
                "unknown granularity '{other}', expected day, month or year"
            ))),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Granularity::Day => "day",
            Granularity::Month => "month",
            Granularity::Year => "year",
        };
        write!(f, "{s}")
    }
}

/// Inclusive date range for a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl ReportRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> LedgerResult<Self> {
        if from > to {
            return Err(LedgerError::validation(format!(
                "report range is inverted: {from} > {to}"
            )));
        }
        Ok(Self { from, to })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.from && date <= self.to
    }
}

/// One bucket of the period report, all figures in USD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub period_start: NaiveDate,
    pub label: String,
    pub ticket_revenue: Decimal,
    pub visa_revenue: Decimal,
    pub cargo_revenue: Decimal,
    /// Haj/Umrah booking revenue.
    pub booking_revenue: Decimal,
    pub total_revenue: Decimal,
    /// Paid expenses only; pending and rejected are excluded.
    pub expenses: Decimal,
    pub net_income: Decimal,
}

impl ReportRow {
    fn empty(period_start: NaiveDate, label: String) -> Self {
        Self {
            period_start,
            label,
            ticket_revenue: Decimal::ZERO,
            visa_revenue: Decimal::ZERO,
            cargo_revenue: Decimal::ZERO,
            booking_revenue: Decimal::ZERO,
            total_revenue: Decimal::ZERO,
            expenses: Decimal::ZERO,
            net_income: Decimal::ZERO,
        }
    }

    fn add_revenue(&mut self, kind: SourceKind, usd: Decimal) {
        match kind {
            SourceKind::Ticket => self.ticket_revenue += usd,
            SourceKind::Visa => self.visa_revenue += usd,
            SourceKind::Cargo => self.cargo_revenue += usd,
            SourceKind::Booking => self.booking_revenue += usd,
        }
    }

    fn finalize(&mut self) {
        self.total_revenue =
            self.ticket_revenue + self.visa_revenue + self.cargo_revenue + self.booking_revenue;
        self.net_income = self.total_revenue - self.expenses;
    }
}

/// Whole-period totals, all in USD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_revenue: Decimal,
    pub total_expenses: Decimal,
    pub net_income: Decimal,
    /// Outstanding customer balances (positive only), at live rates.
    /// Overpaid receivables are refunds due, not receivables, and are
    /// excluded.
    pub total_receivables: Decimal,
    /// Outstanding supplier balances (positive only), at live rates.
    pub total_payables: Decimal,
}

/// A period report: one row per bucket in the range plus summary totals.
///
/// Deterministic by construction: tables iterate ascending by id,
/// buckets ascending by start date, so identical snapshots produce
/// bit-identical reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodReport {
    pub range: ReportRange,
    pub granularity: Granularity,
    pub rows: Vec<ReportRow>,
    pub summary: ReportSummary,
}

impl PeriodReport {
    /// Build a report over a snapshot of the store.
    ///
    /// Revenue is recognized from receipts (money actually received),
    /// converted to USD through each receipt's captured rate snapshot
    /// where present. The receivable/payable outstanding totals use
    /// live rates: they are current figures, not historical ones.
    pub fn build(
        snapshot: &StoreSnapshot,
        range: ReportRange,
        granularity: Granularity,
    ) -> Self {
        let mut rows: BTreeMap<NaiveDate, ReportRow> = BTreeMap::new();
        let mut start = granularity.bucket_start(range.from);
        while start <= range.to {
            rows.insert(start, ReportRow::empty(start, granularity.label(start)));
            start = granularity.next_bucket(start);
        }

        // Revenue from receipts of non-canceled receivables.
        for receipt in snapshot.receipts.values() {
            let Some(payment) = snapshot.payments.get(&receipt.payment_id()) else {
                continue;
            };
            if payment.is_canceled() {
                continue;
            }
            let date = receipt.date().date_naive();
            if !range.contains(date) {
                continue;
            }
            let usd = receipt.value_in_usd(&snapshot.rates);
            if let Some(row) = rows.get_mut(&granularity.bucket_start(date)) {
                row.add_revenue(payment.source().kind(), usd);
            }
        }

        // Only money that actually left counts as an expense.
        for expense in snapshot.expenses.values() {
            if expense.status() != ExpenseStatus::Paid {
                continue;
            }
            if !range.contains(expense.date()) {
                continue;
            }
            let usd = snapshot.rates.to_usd(expense.amount(), expense.currency());
            if let Some(row) = rows.get_mut(&granularity.bucket_start(expense.date())) {
                row.expenses += usd;
            }
        }

        let mut total_revenue = Decimal::ZERO;
        let mut total_expenses = Decimal::ZERO;
        let rows: Vec<ReportRow> = rows
            .into_values()
            .map(|mut row| {
                row.finalize();
                total_revenue += row.total_revenue;
                total_expenses += row.expenses;
                row
            })
            .collect();

        let mut total_receivables = Decimal::ZERO;
        for payment in snapshot.payments.values() {
            if payment.is_canceled() {
                continue;
            }
            let settlement = snapshot.settlement_of(payment);
            if settlement.balance > Decimal::ZERO {
                total_receivables += snapshot
                    .rates
                    .to_usd(settlement.balance, payment.currency());
            }
        }

        let mut total_payables = Decimal::ZERO;
        for payable in snapshot.payables.values() {
            if payable.is_canceled() {
                continue;
            }
            if payable.balance() > Decimal::ZERO {
                total_payables += snapshot.rates.to_usd(payable.balance(), payable.currency());
            }
        }

        Self {
            range,
            granularity,
            rows,
            summary: ReportSummary {
                total_revenue,
                total_expenses,
                net_income: total_revenue - total_expenses,
                total_receivables,
                total_payables,
            },
        }
    }
}

impl SettlementStore {
    /// Aggregate a period report over the store's current state.
    pub fn report(&self, range: ReportRange, granularity: Granularity) -> PeriodReport {
        PeriodReport::build(&self.snapshot(), range, granularity)
    }
}

impl fmt::Display for PeriodReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "=== Period Report {} .. {} (by {}) ===",
            self.range.from, self.range.to, self.granularity
        )?;
        for row in &self.rows {
            writeln!(
                f,
                "{}  tickets {}  visas {}  cargo {}  bookings {}  expenses {}  net {}",
                row.label,
                row.ticket_revenue,
                row.visa_revenue,
                row.cargo_revenue,
                row.booking_revenue,
                row.expenses,
                row.net_income
            )?;
        }
        writeln!(f, "\nRevenue:             {}", self.summary.total_revenue)?;
        writeln!(f, "Expenses:            {}", self.summary.total_expenses)?;
        writeln!(f, "Net income:          {}", self.summary.net_income)?;
        writeln!(f, "Receivables due:     {}", self.summary.total_receivables)?;
        writeln!(f, "Payables due:        {}", self.summary.total_payables)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::actor::ActorId;
    use crate::core::currency::CurrencyCode;
    use crate::core::source::SourceRef;
    use crate::ledger::payment::PaymentMethod;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn jan(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, day).unwrap()
    }

    fn jan_range() -> ReportRange {
        ReportRange::new(jan(1), jan(31)).unwrap()
    }

    fn at(date: NaiveDate) -> chrono::DateTime<Utc> {
        Utc.from_utc_datetime(&date.and_hms_opt(12, 0, 0).unwrap())
    }

    #[test]
    fn test_inverted_range_rejected() {
        assert!(ReportRange::new(jan(31), jan(1)).is_err());
    }

    #[test]
    fn test_empty_store_zero_report() {
        let store = SettlementStore::new();
        let report = store.report(jan_range(), Granularity::Month);
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.summary.total_revenue, Decimal::ZERO);
        assert_eq!(report.summary.net_income, Decimal::ZERO);
    }

    #[test]
    fn test_revenue_bucketed_by_source_kind() {
        let store = SettlementStore::new();
        let ticket = store
            .create_payment(SourceRef::Ticket(Uuid::new_v4()), dec!(500), CurrencyCode::usd())
            .unwrap();
        let visa = store
            .create_payment(SourceRef::Visa(Uuid::new_v4()), dec!(200), CurrencyCode::usd())
            .unwrap();
        store
            .record_receipt(ticket, dec!(500), CurrencyCode::usd(), PaymentMethod::Cash, at(jan(10)))
            .unwrap();
        store
            .record_receipt(visa, dec!(150), CurrencyCode::usd(), PaymentMethod::Card, at(jan(20)))
            .unwrap();

        let report = store.report(jan_range(), Granularity::Month);
        let row = &report.rows[0];
        assert_eq!(row.ticket_revenue, dec!(500));
        assert_eq!(row.visa_revenue, dec!(150));
        assert_eq!(row.total_revenue, dec!(650));
        // 50 still outstanding on the visa receivable.
        assert_eq!(report.summary.total_receivables, dec!(50));
    }

    #[test]
    fn test_only_paid_expenses_count() {
        let store = SettlementStore::new();
        let paid = store
            .create_expense("fuel", dec!(100), CurrencyCode::usd(), jan(5))
            .unwrap();
        store
            .create_expense("stationery", dec!(40), CurrencyCode::usd(), jan(6))
            .unwrap();
        let rejected = store
            .create_expense("misc", dec!(60), CurrencyCode::usd(), jan(7))
            .unwrap();

        let director = ActorId::new("director.yusuf");
        let finance = ActorId::new("finance.amina");
        store.approve_expense(paid, director.clone()).unwrap();
        store.mark_expense_paid(paid, finance).unwrap();
        store.reject_expense(rejected, director).unwrap();

        let report = store.report(jan_range(), Granularity::Month);
        assert_eq!(report.summary.total_expenses, dec!(100));
        assert_eq!(report.summary.net_income, dec!(-100));
    }

    #[test]
    fn test_day_granularity_emits_every_bucket() {
        let store = SettlementStore::new();
        let range = ReportRange::new(jan(1), jan(7)).unwrap();
        let report = store.report(range, Granularity::Day);
        assert_eq!(report.rows.len(), 7);
        assert_eq!(report.rows[0].label, "2026-01-01");
        assert_eq!(report.rows[6].label, "2026-01-07");
    }

    #[test]
    fn test_canceled_payment_excluded() {
        let store = SettlementStore::new();
        let id = store
            .create_payment(SourceRef::Ticket(Uuid::new_v4()), dec!(300), CurrencyCode::usd())
            .unwrap();
        store
            .record_receipt(id, dec!(100), CurrencyCode::usd(), PaymentMethod::Cash, at(jan(3)))
            .unwrap();
        store.cancel_payment(id).unwrap();

        let report = store.report(jan_range(), Granularity::Month);
        assert_eq!(report.summary.total_revenue, Decimal::ZERO);
        assert_eq!(report.summary.total_receivables, Decimal::ZERO);
    }

    #[test]
    fn test_overpaid_receivable_excluded_from_outstanding() {
        let store = SettlementStore::new();
        let id = store
            .create_payment(SourceRef::Booking(Uuid::new_v4()), dec!(100), CurrencyCode::usd())
            .unwrap();
        store
            .record_receipt(id, dec!(120), CurrencyCode::usd(), PaymentMethod::Cash, at(jan(9)))
            .unwrap();

        let report = store.report(jan_range(), Granularity::Month);
        // Refund due of 20 is not an outstanding receivable.
        assert_eq!(report.summary.total_receivables, Decimal::ZERO);
        let s = store.payment_balance(id).unwrap();
        assert_eq!(s.refund_due, dec!(20));
    }

    #[test]
    fn test_payables_outstanding_converted_to_usd() {
        let store = SettlementStore::new();
        store.set_rate(CurrencyCode::new("KES"), dec!(128)).unwrap();
        store
            .create_payable(None, dec!(12800), CurrencyCode::new("KES"), None)
            .unwrap();
        store
            .create_payable(None, dec!(50), CurrencyCode::usd(), None)
            .unwrap();

        let report = store.report(jan_range(), Granularity::Month);
        assert_eq!(report.summary.total_payables, dec!(150));
    }

    #[test]
    fn test_report_is_idempotent() {
        let store = SettlementStore::new();
        store.set_rate(CurrencyCode::new("KES"), dec!(128)).unwrap();
        let id = store
            .create_payment(SourceRef::Cargo(Uuid::new_v4()), dec!(100), CurrencyCode::usd())
            .unwrap();
        store
            .record_receipt(
                id,
                dec!(6400),
                CurrencyCode::new("KES"),
                PaymentMethod::MobileMoney,
                at(jan(15)),
            )
            .unwrap();

        let first = store.report(jan_range(), Granularity::Day);
        let second = store.report(jan_range(), Granularity::Day);
        assert_eq!(first, second);
    }

    #[test]
    fn test_month_buckets_span_year_boundary() {
        let store = SettlementStore::new();
        let range = ReportRange::new(
            NaiveDate::from_ymd_opt(2025, 11, 15).unwrap(),
            NaiveDate::from_ymd_opt(2026, 2, 10).unwrap(),
        )
        .unwrap();
        let report = store.report(range, Granularity::Month);
        let labels: Vec<&str> = report.rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["2025-11", "2025-12", "2026-01", "2026-02"]);
    }
}
