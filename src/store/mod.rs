//! Collaborators the engine reads from and writes to.

pub mod disk;
pub mod memory;

use crate::core::config::UserSettings;
use crate::core::holding::RawHolding;
use crate::core::quote::PriceQuote;
use async_trait::async_trait;

/// Source of the user's holdings, in whatever shape they were stored.
#[async_trait]
pub trait HoldingsSource: Send + Sync {
    async fn get_holdings(&self) -> Vec<RawHolding>;
}

#[async_trait]
pub trait SettingsSource: Send + Sync {
    async fn get_user_settings(&self) -> UserSettings;
}

/// Durable quote cache that survives restarts. Separate from the in-memory
/// TTL caches; failures are logged and treated as misses.
#[async_trait]
pub trait QuoteStore: Send + Sync {
    async fn get_stored_quote(&self, symbol: &str, exchange: &str) -> Option<PriceQuote>;
    async fn save_stored_quote(&self, symbol: &str, exchange: &str, quote: &PriceQuote);
    async fn remove_stored_quote(&self, symbol: &str, exchange: &str);
}

pub(crate) fn store_key(symbol: &str, exchange: &str) -> String {
    format!("{}|{}", symbol, exchange.to_uppercase())
}
