//! Background refresh: a generic periodic task and the valuation loop that
//! republishes the portfolio on a schedule.

use crate::store::{HoldingsSource, SettingsSource};
use crate::valuation::{RefreshReport, Valuation, ValuationAggregator};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument};

/// A spawned loop calling `tick` once immediately and then every `period`.
/// Stops when shut down or dropped.
pub struct PeriodicTask {
    name: &'static str,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            info!(task = name, ?period, "Periodic task started");
            let mut interval = tokio::time::interval(period);
            // A slow tick pushes the schedule back instead of bunching calls up.
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                tick().await;
            }
        });
        Self {
            name,
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stops the loop and waits for it to wind down.
    pub async fn shutdown(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
            debug!(task = self.name, "Periodic task stopped");
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Re-values the portfolio on demand or on a schedule and publishes each
/// result to subscribers. Passes never overlap, and a pass that was
/// superseded by a newer request is discarded instead of published.
pub struct ValuationLoop {
    aggregator: Arc<ValuationAggregator>,
    holdings: Arc<dyn HoldingsSource>,
    settings: Arc<dyn SettingsSource>,
    pass_lock: Mutex<()>,
    generation: AtomicU64,
    tx: watch::Sender<Option<Arc<Valuation>>>,
}

impl ValuationLoop {
    pub fn new(
        aggregator: Arc<ValuationAggregator>,
        holdings: Arc<dyn HoldingsSource>,
        settings: Arc<dyn SettingsSource>,
    ) -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            aggregator,
            holdings,
            settings,
            pass_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
            tx,
        }
    }

    pub fn aggregator(&self) -> &Arc<ValuationAggregator> {
        &self.aggregator
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Valuation>>> {
        self.tx.subscribe()
    }

    pub fn latest(&self) -> Option<Arc<Valuation>> {
        self.tx.borrow().clone()
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Runs one pass. Returns `None` when a newer request arrived before
    /// this pass could publish.
    #[instrument(name = "ValuationPass", skip(self))]
    pub async fn run_pass(&self) -> Option<Arc<Valuation>> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let _pass = self.pass_lock.lock().await;
        if !self.is_current(generation) {
            debug!(generation, "Pass superseded before it started");
            return None;
        }

        let raw = self.holdings.get_holdings().await;
        let settings = self.settings.get_user_settings().await;
        let valuation = Arc::new(
            self.aggregator
                .aggregate(raw, &settings.display_currency)
                .await,
        );

        if !self.is_current(generation) {
            debug!(generation, "Discarding superseded valuation");
            return None;
        }
        self.tx.send_replace(Some(Arc::clone(&valuation)));
        Some(valuation)
    }

    /// Clears caches and overrides, then values and publishes the portfolio.
    pub async fn force_refresh(&self) -> RefreshReport {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let _pass = self.pass_lock.lock().await;

        let raw = self.holdings.get_holdings().await;
        let settings = self.settings.get_user_settings().await;
        let report = self
            .aggregator
            .force_refresh(raw, &settings.display_currency)
            .await;
        self.tx
            .send_replace(Some(Arc::new(report.valuation.clone())));
        report
    }

    /// Runs a pass now and every `period` after that.
    pub fn start(self: &Arc<Self>, period: Duration) -> PeriodicTask {
        let this = Arc::clone(self);
        PeriodicTask::spawn("valuation", period, move || {
            let this = Arc::clone(&this);
            async move {
                this.run_pass().await;
            }
        })
    }
}
