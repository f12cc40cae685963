//! Batch crypto price resolution over three ranked sources.

use crate::core::cache::TtlCache;
use crate::core::currency::{RateSource, RateTable, fallback_usd_rates};
use crate::core::error::FetchError;
use crate::core::fallback::{Resolution, attempt_in_order};
use crate::core::price::{CoinSearch, CoinSearchHit, CryptoSource};
use crate::core::quote::{MarketPrice, PriceQuote, Provenance};
use crate::store::QuoteStore;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

pub const CRYPTO_TTL: Duration = Duration::from_secs(60);
pub const USD_RATE_TTL: Duration = Duration::from_secs(60 * 60);
/// Exchange key crypto quotes are persisted under.
pub const CRYPTO_EXCHANGE: &str = "CRYPTO";

type Batch = HashMap<String, PriceQuote>;

/// Last-resort USD prices for the most common coins.
fn fallback_usd_price(id: &str) -> Option<Decimal> {
    let price = match id {
        "bitcoin" => dec!(43000),
        "ethereum" => dec!(2300),
        "tether" => dec!(1),
        "usd-coin" => dec!(1),
        "binancecoin" => dec!(310),
        "solana" => dec!(100),
        "ripple" => dec!(0.60),
        "cardano" => dec!(0.50),
        "dogecoin" => dec!(0.08),
        "polkadot" => dec!(7),
        "litecoin" => dec!(70),
        "chainlink" => dec!(15),
        "avalanche-2" => dec!(35),
        "tron" => dec!(0.10),
        _ => return None,
    };
    Some(price)
}

/// USD to quote currency rate for the USD-only tiers. Kept apart from the
/// exchange rate service and refreshed at most hourly.
struct UsdRate {
    source: Option<Arc<dyn RateSource>>,
    cache: TtlCache<String, Decimal>,
}

impl UsdRate {
    async fn rate(&self, currency: &str) -> Decimal {
        let currency = currency.to_uppercase();
        if currency == "USD" {
            return Decimal::ONE;
        }
        if let Some(rate) = self.cache.get_fresh(&currency).await {
            return rate;
        }

        let fetched = match &self.source {
            Some(source) => source.fetch_rates("USD").await.map(|rates| {
                let table = RateTable::new("USD", rates);
                table.contains(&currency).then(|| table.rate(&currency))
            }),
            None => Ok(None),
        };
        match fetched {
            Ok(Some(rate)) => {
                self.cache.put(currency, rate).await;
                rate
            }
            Ok(None) => self.remember_fallback(currency).await,
            Err(e) => {
                debug!(error = %e, "USD rate lookup failed");
                self.remember_fallback(currency).await
            }
        }
    }

    /// Caches the stale or default rate for a full TTL so a failing source
    /// is asked again at most hourly.
    async fn remember_fallback(&self, currency: String) -> Decimal {
        let rate = self.stale_or_default(&currency).await;
        self.cache.put(currency, rate).await;
        rate
    }

    async fn stale_or_default(&self, currency: &str) -> Decimal {
        match self.cache.get(&currency.to_string()).await {
            Some(entry) => entry.value,
            None => RateTable::new("USD", fallback_usd_rates()).rate(currency),
        }
    }
}

pub struct CryptoPriceProvider {
    tiers: Vec<Arc<dyn CryptoSource>>,
    search: Option<Arc<dyn CoinSearch>>,
    quote_currency: String,
    cache: TtlCache<(), Batch>,
    usd_rate: UsdRate,
    store: Arc<dyn QuoteStore>,
}

impl CryptoPriceProvider {
    pub fn new(
        tiers: Vec<Arc<dyn CryptoSource>>,
        quote_currency: &str,
        store: Arc<dyn QuoteStore>,
    ) -> Self {
        Self {
            tiers,
            search: None,
            quote_currency: quote_currency.to_uppercase(),
            cache: TtlCache::new(CRYPTO_TTL),
            usd_rate: UsdRate {
                source: None,
                cache: TtlCache::new(USD_RATE_TTL),
            },
            store,
        }
    }

    pub fn with_search(mut self, search: Arc<dyn CoinSearch>) -> Self {
        self.search = Some(search);
        self
    }

    /// Rate source for re-denominating USD-only tiers.
    pub fn with_usd_rates(mut self, source: Arc<dyn RateSource>) -> Self {
        self.usd_rate.source = Some(source);
        self
    }

    pub fn quote_currency(&self) -> &str {
        &self.quote_currency
    }

    /// Returns a quote for every requested id, keyed exactly as requested.
    /// Never fails: ids nothing can price come back as `Unavailable`.
    #[instrument(name = "CryptoBatch", skip(self), fields(count = ids.len()))]
    pub async fn get_prices(&self, ids: &[String]) -> HashMap<String, PriceQuote> {
        let mut wanted: Vec<String> = ids
            .iter()
            .map(|id| normalize_id(id))
            .filter(|id| !id.is_empty())
            .collect();
        wanted.sort();
        wanted.dedup();

        let resolved = if wanted.is_empty() {
            Batch::new()
        } else {
            self.resolve(&wanted).await
        };
        ids.iter()
            .map(|id| {
                let quote = resolved
                    .get(&normalize_id(id))
                    .cloned()
                    .unwrap_or_else(PriceQuote::unavailable);
                (id.clone(), quote)
            })
            .collect()
    }

    /// Quotes keyed by normalized id, one for each of `wanted`.
    async fn resolve(&self, wanted: &[String]) -> Batch {
        if let Some(batch) = self.cache.get_fresh(&()).await
            && wanted.iter().all(|id| batch.contains_key(id))
        {
            return pick(&batch, wanted);
        }

        let previous = self.cache.get(&()).await.map(|entry| entry.value);
        let ticket = self.cache.ticket(&()).await;

        let attempt = attempt_in_order(&self.tiers, |tier| self.fetch_tier(tier, wanted)).await;
        let fresh: Batch = match attempt {
            Resolution::Resolved { value, tier } => {
                let provenance = Provenance::for_tier(tier);
                let fresh: Batch = value
                    .into_iter()
                    .map(|(id, price)| (id, price.into_quote(provenance)))
                    .collect();

                let merged = self
                    .cache
                    .merge_if_current((), ticket, |old| {
                        let mut batch = old.cloned().unwrap_or_default();
                        batch.extend(fresh.iter().map(|(id, q)| (id.clone(), q.clone())));
                        batch
                    })
                    .await;
                if merged.is_some() {
                    for (id, quote) in &fresh {
                        self.store.save_stored_quote(id, CRYPTO_EXCHANGE, quote).await;
                    }
                }
                fresh
            }
            Resolution::Exhausted(errors) => {
                warn!("All {} crypto tiers failed", errors.len());
                Batch::new()
            }
        };

        let mut result = Batch::with_capacity(wanted.len());
        for id in wanted {
            let quote = match fresh.get(id) {
                Some(quote) => quote.clone(),
                None => self.final_resort(id, previous.as_ref()).await,
            };
            result.insert(id.clone(), quote);
        }
        result
    }

    async fn fetch_tier(
        &self,
        tier: &Arc<dyn CryptoSource>,
        ids: &[String],
    ) -> Result<HashMap<String, MarketPrice>, FetchError> {
        if !tier.quotes_in_usd() {
            return tier.fetch_batch(ids, &self.quote_currency).await;
        }
        let prices = tier.fetch_batch(ids, "USD").await?;
        let rate = self.usd_rate.rate(&self.quote_currency).await;
        Ok(prices
            .into_iter()
            .map(|(id, price)| (id, price.scaled(rate)))
            .collect())
    }

    /// Previous batch, then the durable store, then the static table.
    async fn final_resort(&self, id: &str, previous: Option<&Batch>) -> PriceQuote {
        if let Some(quote) = previous.and_then(|batch| batch.get(id)) {
            return quote.clone().into_stale();
        }
        if let Some(quote) = self.store.get_stored_quote(id, CRYPTO_EXCHANGE).await {
            return quote.into_stale();
        }
        match fallback_usd_price(id) {
            Some(usd) => {
                let rate = self.usd_rate.rate(&self.quote_currency).await;
                PriceQuote::fallback(usd * rate)
            }
            None => PriceQuote::unavailable(),
        }
    }

    /// Name search against the first tier's catalogue. Uncached, and errors
    /// reach the caller.
    pub async fn search(&self, query: &str) -> Result<Vec<CoinSearchHit>, FetchError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        match &self.search {
            Some(search) => search.search(query).await,
            None => Err(FetchError::Unavailable("coin search".to_string())),
        }
    }

    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    /// Every id in the cached batch, regardless of age.
    pub async fn cached_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .cache
            .get(&())
            .await
            .map(|entry| entry.value.into_keys().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }
}

fn normalize_id(id: &str) -> String {
    id.trim().to_lowercase()
}

fn pick(batch: &Batch, ids: &[String]) -> Batch {
    ids.iter()
        .filter_map(|id| batch.get(id).map(|q| (id.clone(), q.clone())))
        .collect()
}
