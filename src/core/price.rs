//! Pricing abstractions implemented by the HTTP tiers.

use super::error::FetchError;
use super::holding::InstrumentKey;
use super::quote::MarketPrice;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// One ranked entry in a fallback ladder.
pub trait Tier {
    fn name(&self) -> &str;
}

impl<T: Tier + ?Sized> Tier for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: Tier + ?Sized> Tier for &T {
    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Single-instrument price source (exchange-listed instruments and fund NAVs).
#[async_trait]
pub trait QuoteSource: Tier + Send + Sync {
    async fn fetch_quote(&self, key: &InstrumentKey) -> Result<MarketPrice, FetchError>;
}

/// Batch price source for crypto ids.
#[async_trait]
pub trait CryptoSource: Tier + Send + Sync {
    /// Prices for as many of `ids` as the source knows. Ids it cannot price
    /// are left out; a request yielding nothing at all is an error.
    async fn fetch_batch(
        &self,
        ids: &[String],
        quote_currency: &str,
    ) -> Result<HashMap<String, MarketPrice>, FetchError>;

    /// Sources that only quote in USD are re-denominated by the caller.
    fn quotes_in_usd(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinSearchHit {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub market_cap_rank: Option<u32>,
}

#[async_trait]
pub trait CoinSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<CoinSearchHit>, FetchError>;
}
