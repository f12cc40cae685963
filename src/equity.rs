//! Equity and mutual fund price resolution.
//!
//! Lookup order per instrument: manual override, fresh cache entry, the
//! configured tiers in order, the expired cache entry, the durable quote
//! store, the demo price table, and finally an `Unavailable` quote.

use crate::core::cache::{CacheStats, TtlCache};
use crate::core::error::FetchError;
use crate::core::fallback::{Resolution, attempt_in_order};
use crate::core::holding::{AssetClass, InstrumentKey};
use crate::core::limiter::SlidingWindowLimiter;
use crate::core::price::{QuoteSource, Tier};
use crate::core::quote::{MarketPrice, PriceQuote, Provenance};
use crate::store::QuoteStore;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, instrument};

pub const EQUITY_TTL: Duration = Duration::from_secs(5 * 60);
pub const SECONDARY_WINDOW: Duration = Duration::from_secs(60);

/// A quote source plus the guards that apply to it.
pub struct EquityTier {
    source: Arc<dyn QuoteSource>,
    provenance: Provenance,
    limiter: Option<SlidingWindowLimiter>,
    permits: Option<Semaphore>,
}

impl EquityTier {
    pub fn primary(source: Arc<dyn QuoteSource>) -> Self {
        Self {
            source,
            provenance: Provenance::PrimaryApi,
            limiter: None,
            permits: None,
        }
    }

    /// Public, rate-limited channel: at most `calls_per_minute` requests in
    /// any 60 second window and `max_concurrent` requests in flight.
    pub fn secondary(
        source: Arc<dyn QuoteSource>,
        calls_per_minute: usize,
        max_concurrent: usize,
    ) -> Self {
        Self {
            source,
            provenance: Provenance::SecondaryApi,
            limiter: Some(SlidingWindowLimiter::new(SECONDARY_WINDOW, calls_per_minute)),
            permits: Some(Semaphore::new(max_concurrent.clamp(1, calls_per_minute.max(1)))),
        }
    }

    async fn fetch(&self, key: &InstrumentKey) -> Result<MarketPrice, FetchError> {
        let _permit = match &self.permits {
            Some(permits) => Some(
                permits
                    .acquire()
                    .await
                    .map_err(|_| FetchError::Unavailable(self.name().to_string()))?,
            ),
            None => None,
        };
        if let Some(limiter) = &self.limiter
            && !limiter.try_acquire()
        {
            return Err(FetchError::RateLimited(self.name().to_string()));
        }
        self.source.fetch_quote(key).await
    }
}

impl Tier for EquityTier {
    fn name(&self) -> &str {
        self.source.name()
    }
}

/// Demo prices for well-known symbols, shown when nothing else is known.
fn demo_price(symbol: &str) -> Option<Decimal> {
    let price = match symbol {
        "AAPL" => dec!(175.50),
        "MSFT" => dec!(378.90),
        "GOOGL" => dec!(141.80),
        "AMZN" => dec!(178.25),
        "TSLA" => dec!(248.50),
        "META" => dec!(505.75),
        "NVDA" => dec!(875.30),
        "RELIANCE" => dec!(2950.00),
        "TCS" => dec!(4100.00),
        "INFY" => dec!(1650.00),
        "HDFCBANK" => dec!(1680.00),
        "ICICIBANK" => dec!(1120.00),
        "SBIN" => dec!(780.00),
        "WIPRO" => dec!(520.00),
        _ => return None,
    };
    Some(price)
}

pub struct EquityPriceProvider {
    tiers: Vec<EquityTier>,
    nav_tiers: Vec<EquityTier>,
    cache: TtlCache<InstrumentKey, PriceQuote>,
    /// Overrides by key. `None` records a store lookup that found none.
    manual: Mutex<HashMap<InstrumentKey, Option<PriceQuote>>>,
    /// Set once every override has been dropped; overrides persisted by an
    /// earlier session are then deleted instead of re-adopted.
    discard_stored: AtomicBool,
    store: Arc<dyn QuoteStore>,
}

impl EquityPriceProvider {
    /// `tiers` are tried in order for listed instruments, `nav_tiers` for funds.
    pub fn new(
        tiers: Vec<EquityTier>,
        nav_tiers: Vec<EquityTier>,
        store: Arc<dyn QuoteStore>,
    ) -> Self {
        Self::with_ttl(tiers, nav_tiers, store, EQUITY_TTL)
    }

    pub fn with_ttl(
        tiers: Vec<EquityTier>,
        nav_tiers: Vec<EquityTier>,
        store: Arc<dyn QuoteStore>,
        ttl: Duration,
    ) -> Self {
        Self {
            tiers,
            nav_tiers,
            cache: TtlCache::new(ttl),
            manual: Mutex::new(HashMap::new()),
            discard_stored: AtomicBool::new(false),
            store,
        }
    }

    pub async fn get_price(&self, symbol: &str, exchange: &str) -> PriceQuote {
        let key = InstrumentKey::new(symbol, exchange);
        self.resolve(&key, &self.tiers).await
    }

    /// NAV for a mutual fund scheme code.
    pub async fn get_fund_nav(&self, code: &str) -> PriceQuote {
        let key = InstrumentKey::new(code, "AMFI");
        self.resolve(&key, &self.nav_tiers).await
    }

    pub async fn quote_for(&self, key: &InstrumentKey, asset_class: AssetClass) -> PriceQuote {
        match asset_class {
            AssetClass::MutualFund => self.resolve(key, &self.nav_tiers).await,
            _ => self.resolve(key, &self.tiers).await,
        }
    }

    #[instrument(name = "EquityResolve", skip(self, tiers), fields(instrument = %key))]
    async fn resolve(&self, key: &InstrumentKey, tiers: &[EquityTier]) -> PriceQuote {
        if let Some(quote) = self.manual_override(key).await {
            return quote;
        }
        if let Some(quote) = self.cache.get_fresh(key).await {
            return quote;
        }

        let ticket = self.cache.ticket(key).await;
        match attempt_in_order(tiers, |tier| tier.fetch(key)).await {
            Resolution::Resolved { value, tier } => {
                let quote = value.into_quote(tiers[tier].provenance);
                if self
                    .cache
                    .put_if_current(key.clone(), quote.clone(), ticket)
                    .await
                {
                    self.store
                        .save_stored_quote(&key.symbol, &key.exchange, &quote)
                        .await;
                    return quote;
                }
                // A manual write or clear won the race; it takes precedence.
                self.manual_override(key).await.unwrap_or(quote)
            }
            Resolution::Exhausted(errors) => {
                debug!("All {} tiers failed", errors.len());
                self.final_resort(key).await
            }
        }
    }

    async fn final_resort(&self, key: &InstrumentKey) -> PriceQuote {
        if let Some(entry) = self.cache.get(key).await {
            debug!(age = ?entry.age(), "Serving expired cache entry");
            return entry.value.into_stale();
        }
        if let Some(stored) = self.store.get_stored_quote(&key.symbol, &key.exchange).await {
            debug!("Serving quote from durable store");
            return stored.into_stale();
        }
        match demo_price(&key.symbol) {
            Some(price) => PriceQuote::fallback(price),
            None => PriceQuote::unavailable(),
        }
    }

    /// The in-memory override, or one persisted by an earlier session. The
    /// store is consulted once per key.
    async fn manual_override(&self, key: &InstrumentKey) -> Option<PriceQuote> {
        let mut manual = self.manual.lock().await;
        if let Some(known) = manual.get(key) {
            return known.clone();
        }
        let stored = self
            .store
            .get_stored_quote(&key.symbol, &key.exchange)
            .await
            .filter(|q| q.provenance == Provenance::Manual);
        let adopted = match stored {
            Some(_) if self.discard_stored.load(Ordering::Acquire) => {
                debug!("Discarding stored manual price");
                self.store
                    .remove_stored_quote(&key.symbol, &key.exchange)
                    .await;
                None
            }
            Some(quote) => {
                debug!("Re-adopting stored manual price");
                Some(quote)
            }
            None => None,
        };
        manual.insert(key.clone(), adopted.clone());
        adopted
    }

    /// Pins a user-entered price. Automatic refreshes leave it alone until it
    /// is cleared or a forced refresh is requested.
    pub async fn set_manual_price(&self, symbol: &str, exchange: &str, price: Decimal) -> PriceQuote {
        let key = InstrumentKey::new(symbol, exchange);
        let quote = PriceQuote::manual(price);
        info!(instrument = %key, %price, "Manual price set");
        self.manual
            .lock()
            .await
            .insert(key.clone(), Some(quote.clone()));
        self.store
            .save_stored_quote(&key.symbol, &key.exchange, &quote)
            .await;
        self.cache.put(key, quote.clone()).await;
        quote
    }

    pub async fn clear_manual_price(&self, symbol: &str, exchange: &str) {
        let key = InstrumentKey::new(symbol, exchange);
        self.drop_override(&key).await;
    }

    async fn drop_override(&self, key: &InstrumentKey) {
        if self.manual_override(key).await.is_some() {
            self.manual.lock().await.insert(key.clone(), None);
            self.store
                .remove_stored_quote(&key.symbol, &key.exchange)
                .await;
            self.cache.remove(key).await;
        }
    }

    /// Drops any override and cached entry for the instrument, then resolves
    /// it again from the tiers.
    pub async fn force_refresh(&self, symbol: &str, exchange: &str) -> PriceQuote {
        let key = InstrumentKey::new(symbol, exchange);
        self.drop_override(&key).await;
        self.cache.remove(&key).await;
        self.resolve(&key, &self.tiers).await
    }

    /// Drops every override, including ones persisted by an earlier session
    /// that this one has not looked up yet.
    pub async fn clear_manual_overrides(&self) {
        self.discard_stored.store(true, Ordering::Release);
        let keys: Vec<InstrumentKey> = self
            .manual
            .lock()
            .await
            .iter_mut()
            .filter_map(|(key, known)| known.take().map(|_| key.clone()))
            .collect();
        for key in keys {
            self.store
                .remove_stored_quote(&key.symbol, &key.exchange)
                .await;
        }
    }

    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }
}
