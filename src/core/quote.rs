//! Price quotes and where they came from.

use super::error::FetchError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Which tier or fallback produced a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provenance {
    PrimaryApi,
    SecondaryApi,
    TertiaryApi,
    CachedStale,
    Manual,
    HardcodedFallback,
    Unavailable,
}

impl Provenance {
    /// Provenance for the tier at `index` in a fallback ladder.
    pub fn for_tier(index: usize) -> Self {
        match index {
            0 => Provenance::PrimaryApi,
            1 => Provenance::SecondaryApi,
            _ => Provenance::TertiaryApi,
        }
    }

    /// True when the quote reflects a live fetch or an explicit user value.
    pub fn is_fresh(&self) -> bool {
        matches!(
            self,
            Provenance::PrimaryApi
                | Provenance::SecondaryApi
                | Provenance::TertiaryApi
                | Provenance::Manual
        )
    }
}

impl Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Provenance::PrimaryApi => "live",
                Provenance::SecondaryApi => "live (secondary)",
                Provenance::TertiaryApi => "live (tertiary)",
                Provenance::CachedStale => "cached",
                Provenance::Manual => "manual",
                Provenance::HardcodedFallback => "demo",
                Provenance::Unavailable => "no data",
            }
        )
    }
}

/// A resolved price. Replaced wholesale on refresh, never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub price: Decimal,
    pub change_absolute: Decimal,
    pub change_percent: Decimal,
    pub as_of: DateTime<Utc>,
    pub provenance: Provenance,
    pub is_stale: bool,
}

impl PriceQuote {
    pub fn new(
        price: Decimal,
        change_absolute: Decimal,
        change_percent: Decimal,
        provenance: Provenance,
    ) -> Self {
        Self {
            price,
            change_absolute,
            change_percent,
            as_of: Utc::now(),
            provenance,
            is_stale: false,
        }
    }

    /// The terminal "nothing more can be done" quote.
    pub fn unavailable() -> Self {
        Self::new(
            Decimal::ZERO,
            Decimal::ZERO,
            Decimal::ZERO,
            Provenance::Unavailable,
        )
    }

    pub fn manual(price: Decimal) -> Self {
        Self::new(price, Decimal::ZERO, Decimal::ZERO, Provenance::Manual)
    }

    pub fn fallback(price: Decimal) -> Self {
        Self::new(
            price,
            Decimal::ZERO,
            Decimal::ZERO,
            Provenance::HardcodedFallback,
        )
    }

    /// Same figures, re-tagged as an expired cache entry.
    pub fn into_stale(self) -> Self {
        Self {
            provenance: Provenance::CachedStale,
            is_stale: true,
            ..self
        }
    }

    pub fn is_unavailable(&self) -> bool {
        self.provenance == Provenance::Unavailable
    }
}

/// Raw figures returned by a tier, before a provenance is attached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketPrice {
    pub price: Decimal,
    pub change_absolute: Decimal,
    pub change_percent: Decimal,
}

impl MarketPrice {
    pub fn flat(price: Decimal) -> Self {
        Self {
            price,
            change_absolute: Decimal::ZERO,
            change_percent: Decimal::ZERO,
        }
    }

    pub fn from_previous_close(price: Decimal, previous_close: Decimal) -> Self {
        if previous_close.is_zero() {
            return Self::flat(price);
        }
        let change_absolute = price - previous_close;
        Self {
            price,
            change_absolute,
            change_percent: change_absolute / previous_close * Decimal::ONE_HUNDRED,
        }
    }

    /// Derives the absolute move from a 24h percentage change.
    pub fn from_change_percent(price: Decimal, change_percent: Decimal) -> Self {
        let factor = Decimal::ONE + change_percent / Decimal::ONE_HUNDRED;
        let change_absolute = if factor.is_zero() {
            price
        } else {
            price - price / factor
        };
        Self {
            price,
            change_absolute,
            change_percent,
        }
    }

    /// Re-denominates price and absolute change by `rate`; the percentage is unit-free.
    pub fn scaled(self, rate: Decimal) -> Self {
        Self {
            price: self.price * rate,
            change_absolute: self.change_absolute * rate,
            change_percent: self.change_percent,
        }
    }

    pub fn into_quote(self, provenance: Provenance) -> PriceQuote {
        PriceQuote::new(
            self.price,
            self.change_absolute,
            self.change_percent,
            provenance,
        )
    }
}

/// Converts a JSON float into a decimal, rejecting NaN and infinities.
pub fn decimal_from_f64(value: f64, field: &str) -> Result<Decimal, FetchError> {
    Decimal::from_f64(value)
        .ok_or_else(|| FetchError::Malformed(format!("{field} is not a finite number: {value}")))
}

/// Parses a decimal sent as a JSON string, as several crypto APIs do.
pub fn decimal_from_str(value: &str, field: &str) -> Result<Decimal, FetchError> {
    value
        .trim()
        .parse::<Decimal>()
        .map_err(|e| FetchError::Malformed(format!("{field} '{value}': {e}")))
}
