//! Currency rate tables and conversion abstractions

use super::error::FetchError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

/// A source of "units of X per one unit of `base`" rates.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch_rates(&self, base: &str) -> Result<HashMap<String, Decimal>, FetchError>;
}

/// Rates relative to a fixed base. `rates[base]` is always exactly one.
#[derive(Debug, Clone, PartialEq)]
pub struct RateTable {
    base: String,
    rates: HashMap<String, Decimal>,
    as_of: DateTime<Utc>,
}

impl RateTable {
    pub fn new(base: &str, rates: HashMap<String, Decimal>) -> Self {
        let base = base.to_uppercase();
        let mut rates: HashMap<String, Decimal> = rates
            .into_iter()
            .filter(|(_, rate)| *rate > Decimal::ZERO)
            .map(|(code, rate)| (code.to_uppercase(), rate))
            .collect();
        rates.insert(base.clone(), Decimal::ONE);
        Self {
            base,
            rates,
            as_of: Utc::now(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn as_of(&self) -> DateTime<Utc> {
        self.as_of
    }

    pub fn contains(&self, currency: &str) -> bool {
        self.rates.contains_key(&currency.to_uppercase())
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Unknown codes resolve to identity rather than failing.
    pub fn rate(&self, currency: &str) -> Decimal {
        self.rates
            .get(&currency.to_uppercase())
            .copied()
            .unwrap_or(Decimal::ONE)
    }

    /// `amount / rate[from] * rate[to]`.
    pub fn convert(&self, amount: Decimal, from: &str, to: &str) -> Decimal {
        if from.eq_ignore_ascii_case(to) {
            return amount;
        }
        amount / self.rate(from) * self.rate(to)
    }
}

/// Static USD-based rates used until a live table has ever been fetched.
pub fn fallback_usd_rates() -> HashMap<String, Decimal> {
    [
        ("USD", dec!(1)),
        ("EUR", dec!(0.92)),
        ("GBP", dec!(0.79)),
        ("INR", dec!(83.2)),
        ("JPY", dec!(150.0)),
        ("CAD", dec!(1.36)),
        ("AUD", dec!(1.52)),
        ("CHF", dec!(0.88)),
        ("CNY", dec!(7.2)),
        ("SGD", dec!(1.34)),
        ("HKD", dec!(7.82)),
        ("AED", dec!(3.67)),
    ]
    .into_iter()
    .map(|(code, rate)| (code.to_string(), rate))
    .collect()
}
