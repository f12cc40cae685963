use super::{QuoteStore, store_key};
use crate::core::quote::PriceQuote;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

/// In-memory quote store, for tests and when no data directory is usable.
#[derive(Default)]
pub struct MemoryQuoteStore {
    inner: Mutex<HashMap<String, PriceQuote>>,
}

impl MemoryQuoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}

#[async_trait]
impl QuoteStore for MemoryQuoteStore {
    async fn get_stored_quote(&self, symbol: &str, exchange: &str) -> Option<PriceQuote> {
        let key = store_key(symbol, exchange);
        let store = self.inner.lock().await;
        let value = store.get(&key).cloned();
        debug!(hit = value.is_some(), "Quote store GET for key: {}", key);
        value
    }

    async fn save_stored_quote(&self, symbol: &str, exchange: &str, quote: &PriceQuote) {
        let key = store_key(symbol, exchange);
        debug!("Quote store PUT for key: {}", key);
        self.inner.lock().await.insert(key, quote.clone());
    }

    async fn remove_stored_quote(&self, symbol: &str, exchange: &str) {
        let key = store_key(symbol, exchange);
        debug!("Quote store REMOVE for key: {}", key);
        self.inner.lock().await.remove(&key);
    }
}
