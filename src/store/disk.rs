use super::{QuoteStore, store_key};
use crate::core::quote::PriceQuote;
use anyhow::{Context, Result};
use async_trait::async_trait;
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::path::Path;
use tracing::debug;

const QUOTES_PARTITION: &str = "quotes";

/// Quote store backed by a fjall partition, JSON-encoded per key.
pub struct DiskQuoteStore {
    keyspace: Keyspace,
    partition: PartitionHandle,
}

impl DiskQuoteStore {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create store directory: {}", path.display()))?;
        let keyspace = fjall::Config::new(path)
            .open()
            .with_context(|| format!("Failed to open quote store at {}", path.display()))?;
        let partition = keyspace
            .open_partition(QUOTES_PARTITION, PartitionCreateOptions::default())
            .context("Failed to open quotes partition")?;
        Ok(Self {
            keyspace,
            partition,
        })
    }
}

#[async_trait]
impl QuoteStore for DiskQuoteStore {
    async fn get_stored_quote(&self, symbol: &str, exchange: &str) -> Option<PriceQuote> {
        let key = store_key(symbol, exchange);
        let res: Result<Option<PriceQuote>> = (|| {
            match self.partition.get(key.as_bytes())? {
                Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
                None => Ok(None),
            }
        })();

        match res {
            Ok(value) => {
                debug!(hit = value.is_some(), "Quote store GET for key: {}", key);
                value
            }
            Err(e) => {
                debug!("DiskQuoteStore get error for {}: {}", key, e);
                None
            }
        }
    }

    async fn save_stored_quote(&self, symbol: &str, exchange: &str, quote: &PriceQuote) {
        let key = store_key(symbol, exchange);
        let res: Result<()> = (|| {
            self.partition
                .insert(key.as_bytes(), serde_json::to_vec(quote)?)?;
            self.keyspace.persist(PersistMode::Buffer)?;
            Ok(())
        })();
        match res {
            Ok(()) => debug!("Quote store PUT for key: {}", key),
            Err(e) => debug!("DiskQuoteStore put error for {}: {}", key, e),
        }
    }

    async fn remove_stored_quote(&self, symbol: &str, exchange: &str) {
        let key = store_key(symbol, exchange);
        let res = self
            .partition
            .remove(key.as_bytes())
            .and_then(|()| self.keyspace.persist(PersistMode::Buffer));
        if let Err(e) = res {
            debug!("DiskQuoteStore remove error for {}: {}", key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::quote::{MarketPrice, Provenance};
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_disk_store_get_put_remove() {
        let dir = tempdir().unwrap();
        let store = DiskQuoteStore::open(dir.path()).unwrap();

        assert!(store.get_stored_quote("ACME", "NSE").await.is_none());

        let quote = MarketPrice::from_previous_close(dec!(150), dec!(140))
            .into_quote(Provenance::SecondaryApi);
        store.save_stored_quote("ACME", "NSE", &quote).await;
        assert_eq!(store.get_stored_quote("ACME", "NSE").await, Some(quote));

        store.remove_stored_quote("ACME", "NSE").await;
        assert!(store.get_stored_quote("ACME", "NSE").await.is_none());
    }

    #[tokio::test]
    async fn test_disk_store_survives_reopen() {
        let dir = tempdir().unwrap();
        let quote = PriceQuote::manual(dec!(99.5));
        {
            let store = DiskQuoteStore::open(dir.path()).unwrap();
            store.save_stored_quote("bitcoin", "CRYPTO", &quote).await;
        }

        let reopened = DiskQuoteStore::open(dir.path()).unwrap();
        assert_eq!(
            reopened.get_stored_quote("bitcoin", "CRYPTO").await,
            Some(quote)
        );
    }
}
