use crate::core::error::{LedgerError, LedgerResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// ISO 4217-style currency code.
///
/// Supports standard fiat currencies (USD, KES, SAR, AED, etc.)
/// as well as arbitrary identifiers a tenant may configure.
///
/// # Examples
///
/// ```
/// use settlement_engine::core::currency::CurrencyCode;
///
/// let usd = CurrencyCode::usd();
/// let kes = CurrencyCode::new("KES");
/// assert_ne!(usd, kes);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// The base currency every report is denominated in.
    pub fn usd() -> Self {
        Self("USD".to_string())
    }

    pub fn is_usd(&self) -> bool {
        self.0 == "USD"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CurrencyCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Per-tenant exchange rate table, quoted as units of currency per 1 USD.
///
/// A KES rate of 128 means 128 KES = 1 USD. USD itself is implicit with
/// rate 1 and is never stored. A lookup for a currency with no configured
/// rate falls back to 1 — conversion degrades to pass-through rather than
/// failing, which is the documented behavior for tenants that have not
/// finished configuring their rates.
///
/// # Examples
///
/// ```
/// use settlement_engine::core::currency::{CurrencyCode, RateTable};
/// use rust_decimal_macros::dec;
///
/// let mut rates = RateTable::new();
/// rates.set_rate(CurrencyCode::new("KES"), dec!(128)).unwrap();
///
/// let usd = rates.to_usd(dec!(12800), &CurrencyCode::new("KES"));
/// assert_eq!(usd, dec!(100));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    rates: BTreeMap<CurrencyCode, Decimal>,
}

impl RateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the rate for a currency: 1 USD = `rate` units of `currency`.
    ///
    /// Rejects non-positive rates and attempts to store a rate for USD
    /// itself (it is the implicit base).
    pub fn set_rate(&mut self, currency: CurrencyCode, rate: Decimal) -> LedgerResult<()> {
        if rate <= Decimal::ZERO {
            return Err(LedgerError::validation(format!(
                "rate for {currency} must be positive, got {rate}"
            )));
        }
        if currency.is_usd() {
            return Err(LedgerError::validation(
                "USD is the base currency and its rate is implicit",
            ));
        }
        self.rates.insert(currency, rate);
        Ok(())
    }

    /// Remove a configured rate. Lookups for the currency fall back to 1.
    pub fn remove_rate(&mut self, currency: &CurrencyCode) {
        self.rates.remove(currency);
    }

    /// The rate for a currency, falling back to 1 when none is configured.
    pub fn rate_for(&self, currency: &CurrencyCode) -> Decimal {
        if currency.is_usd() {
            return Decimal::ONE;
        }
        self.rates.get(currency).copied().unwrap_or(Decimal::ONE)
    }

    /// Convert an amount in `currency` to USD using the live table.
    pub fn to_usd(&self, amount: Decimal, currency: &CurrencyCode) -> Decimal {
        self.to_usd_with_snapshot(amount, currency, None)
    }

    /// Convert to USD, preferring a rate snapshot captured when the
    /// underlying transaction was recorded.
    ///
    /// The snapshot takes precedence over the live table so that figures
    /// for past periods do not retroactively change when an administrator
    /// edits today's rates.
    pub fn to_usd_with_snapshot(
        &self,
        amount: Decimal,
        currency: &CurrencyCode,
        snapshot: Option<Decimal>,
    ) -> Decimal {
        if currency.is_usd() {
            return amount;
        }
        let rate = snapshot.unwrap_or_else(|| self.rate_for(currency));
        amount / rate
    }

    /// Convert a USD amount into `currency` using the live table.
    pub fn from_usd(&self, amount: Decimal, currency: &CurrencyCode) -> Decimal {
        if currency.is_usd() {
            return amount;
        }
        amount * self.rate_for(currency)
    }

    /// Convert between two currencies through USD.
    pub fn convert(&self, amount: Decimal, from: &CurrencyCode, to: &CurrencyCode) -> Decimal {
        if from == to {
            return amount;
        }
        self.from_usd(self.to_usd(amount, from), to)
    }

    /// Configured (currency, rate) pairs in ascending currency order.
    pub fn entries(&self) -> impl Iterator<Item = (&CurrencyCode, Decimal)> {
        self.rates.iter().map(|(c, r)| (c, *r))
    }
}
