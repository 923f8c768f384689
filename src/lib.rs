//! # settlement-engine
//!
//! Multi-currency settlement and reconciliation engine for travel-agency
//! back offices.
//!
//! Source modules (ticketing, visas, cargo, Haj/Umrah bookings) create
//! receivables and payables here; the engine tracks partial collection
//! through receipts, runs the payable and expense approval workflows,
//! and rolls everything into USD period reports.
//!
//! ## Architecture
//!
//! - **core** — Foundational types: currency rates, source references,
//!   actor ids, the error taxonomy
//! - **ledger** — Receivable, payable and expense rows and their state
//!   machines
//! - **store** — The atomic backing store serializing balance-mutating
//!   transitions
//! - **report** — Period report aggregation into USD

pub mod core;
pub mod ledger;
pub mod report;
pub mod store;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::core::actor::ActorId;
    pub use crate::core::currency::{CurrencyCode, RateTable};
    pub use crate::core::error::{LedgerError, LedgerResult};
    pub use crate::core::source::{SourceKind, SourceRef};
    pub use crate::ledger::expense::{Expense, ExpenseStatus};
    pub use crate::ledger::payable::{Payable, PayableApprovalStatus, PayablePayment};
    pub use crate::ledger::payment::{Payment, PaymentMethod, PaymentStatus, Receipt, Settlement};
    pub use crate::report::aggregator::{Granularity, PeriodReport, ReportRange};
    pub use crate::store::SettlementStore;
}
