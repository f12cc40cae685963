//! Exchange rate service: a USD-based rate table refreshed at most once per
//! TTL, with a static table standing in until the first successful fetch.

use crate::core::currency::{RateSource, RateTable, fallback_usd_rates};
use crate::core::quote::Provenance;
use crate::refresh::PeriodicTask;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

pub const BASE_CURRENCY: &str = "USD";
pub const RATE_TTL: Duration = Duration::from_secs(10 * 60);

/// Where the table behind a snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateState {
    Live,
    /// Last live table, older than the TTL because refreshes keep failing.
    Expired,
    /// No live table yet; static default rates.
    Fallback,
}

impl RateState {
    /// Provenance for prices derived purely from the rate table.
    pub fn provenance(&self) -> Provenance {
        match self {
            RateState::Live => Provenance::PrimaryApi,
            RateState::Expired => Provenance::CachedStale,
            RateState::Fallback => Provenance::HardcodedFallback,
        }
    }
}

/// A consistent view of the rates for the duration of one valuation pass.
#[derive(Debug, Clone)]
pub struct RateSnapshot {
    pub table: Arc<RateTable>,
    pub state: RateState,
}

impl RateSnapshot {
    pub fn rate(&self, currency: &str) -> Decimal {
        self.table.rate(currency)
    }

    pub fn convert(&self, amount: Decimal, from: &str, to: &str) -> Decimal {
        self.table.convert(amount, from, to)
    }
}

struct LiveTable {
    table: Arc<RateTable>,
    fetched_at: Instant,
}

pub struct ExchangeRateService {
    source: Arc<dyn RateSource>,
    ttl: Duration,
    live: RwLock<Option<LiveTable>>,
    fallback: Arc<RateTable>,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag however the refresh ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ExchangeRateService {
    pub fn new(source: Arc<dyn RateSource>) -> Self {
        Self::with_ttl(source, RATE_TTL)
    }

    pub fn with_ttl(source: Arc<dyn RateSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            live: RwLock::new(None),
            fallback: Arc::new(RateTable::new(BASE_CURRENCY, fallback_usd_rates())),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Current table. Callers see either the table from before a refresh or
    /// the one after it, never a mix.
    pub fn snapshot(&self) -> RateSnapshot {
        let live = self.live.read().unwrap_or_else(PoisonError::into_inner);
        match live.as_ref() {
            Some(live) => RateSnapshot {
                table: Arc::clone(&live.table),
                state: if live.fetched_at.elapsed() < self.ttl {
                    RateState::Live
                } else {
                    RateState::Expired
                },
            },
            None => RateSnapshot {
                table: Arc::clone(&self.fallback),
                state: RateState::Fallback,
            },
        }
    }

    pub fn get_rate(&self, currency: &str) -> Decimal {
        self.snapshot().rate(currency)
    }

    pub fn convert(&self, amount: Decimal, from: &str, to: &str) -> Decimal {
        self.snapshot().convert(amount, from, to)
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        let live = self.live.read().unwrap_or_else(PoisonError::into_inner);
        live.as_ref().map(|l| l.table.as_of())
    }

    fn is_fresh(&self) -> bool {
        let live = self.live.read().unwrap_or_else(PoisonError::into_inner);
        live.as_ref()
            .is_some_and(|l| l.fetched_at.elapsed() < self.ttl)
    }

    /// Fetches a new table unless the current one is younger than the TTL.
    /// Never fails: on error the existing table stays in place.
    pub async fn refresh(&self) {
        if self.is_fresh() {
            debug!("Rate table still fresh, skipping refresh");
            return;
        }
        self.refresh_inner(false).await;
    }

    /// Refreshes regardless of the table's age.
    pub async fn force_refresh(&self) {
        self.refresh_inner(true).await;
    }

    #[instrument(name = "RateRefresh", skip(self))]
    async fn refresh_inner(&self, force: bool) {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Rate refresh already in flight");
            return;
        }
        let _guard = InFlight(&self.in_flight);

        if !force && self.is_fresh() {
            return;
        }

        match self.source.fetch_rates(BASE_CURRENCY).await {
            Ok(rates) => {
                let table = RateTable::new(BASE_CURRENCY, rates);
                info!("Loaded {} exchange rates", table.len());
                let mut live = self.live.write().unwrap_or_else(PoisonError::into_inner);
                *live = Some(LiveTable {
                    table: Arc::new(table),
                    fetched_at: Instant::now(),
                });
            }
            Err(e) => warn!(error = %e, "Exchange rate refresh failed, keeping current table"),
        }
    }

    /// Performs the startup refresh and keeps the table warm every TTL until
    /// the returned task is shut down or dropped.
    pub fn initialize(self: &Arc<Self>) -> PeriodicTask {
        let service = Arc::clone(self);
        PeriodicTask::spawn("exchange-rates", self.ttl, move || {
            let service = Arc::clone(&service);
            async move { service.refresh().await }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::FetchError;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct StubRates {
        calls: AtomicUsize,
        failing: AtomicBool,
        delay: Duration,
    }

    #[async_trait]
    impl RateSource for StubRates {
        async fn fetch_rates(&self, _base: &str) -> Result<HashMap<String, Decimal>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(FetchError::Network("down".into()));
            }
            Ok(HashMap::from([
                ("EUR".to_string(), dec!(0.5)),
                ("INR".to_string(), dec!(80)),
            ]))
        }
    }

    fn service(stub: &Arc<StubRates>) -> ExchangeRateService {
        ExchangeRateService::new(Arc::clone(stub) as Arc<dyn RateSource>)
    }

    #[tokio::test]
    async fn test_fallback_table_before_first_refresh() {
        let stub = Arc::new(StubRates::default());
        let service = service(&stub);

        let snapshot = service.snapshot();
        assert_eq!(snapshot.state, RateState::Fallback);
        assert_eq!(service.get_rate("INR"), dec!(83.2));
        assert_eq!(service.get_rate("USD"), Decimal::ONE);
        assert!(service.last_updated().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_is_noop_within_ttl() {
        let stub = Arc::new(StubRates::default());
        let service = service(&stub);

        service.refresh().await;
        service.refresh().await;
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
        assert_eq!(service.get_rate("EUR"), dec!(0.5));
        assert_eq!(service.snapshot().state, RateState::Live);

        tokio::time::advance(RATE_TTL).await;
        service.refresh().await;
        assert_eq!(stub.calls.load(Ordering::SeqCst), 2);

        service.force_refresh().await;
        assert_eq!(stub.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_keeps_existing_table() {
        let stub = Arc::new(StubRates::default());
        let service = service(&stub);
        service.refresh().await;

        stub.failing.store(true, Ordering::SeqCst);
        tokio::time::advance(RATE_TTL + Duration::from_secs(1)).await;
        service.refresh().await;

        let snapshot = service.snapshot();
        assert_eq!(snapshot.state, RateState::Expired);
        assert_eq!(snapshot.rate("INR"), dec!(80));
        assert_eq!(service.convert(dec!(10), "EUR", "INR"), dec!(1600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_refreshes_issue_one_request() {
        let stub = Arc::new(StubRates {
            delay: Duration::from_millis(200),
            ..Default::default()
        });
        let service = service(&stub);

        tokio::join!(service.refresh(), service.refresh(), service.force_refresh());
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
        assert_eq!(service.snapshot().state, RateState::Live);
    }

    #[tokio::test]
    async fn test_conversion_identity() {
        let stub = Arc::new(StubRates::default());
        let service = service(&stub);
        service.refresh().await;
        for code in ["USD", "EUR", "INR", "ABC"] {
            assert_eq!(service.convert(dec!(42.42), code, code), dec!(42.42));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_refreshes_until_dropped() {
        let stub = Arc::new(StubRates::default());
        let service = Arc::new(ExchangeRateService::with_ttl(
            Arc::clone(&stub) as Arc<dyn RateSource>,
            Duration::from_secs(60),
        ));

        let task = service.initialize();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(stub.calls.load(Ordering::SeqCst), 2);

        drop(task);
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(stub.calls.load(Ordering::SeqCst), 2);
    }
}
