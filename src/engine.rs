//! Wires configured tiers, caches and the quote store into the services.

use crate::core::config::AppConfig;
use crate::core::price::{CryptoSource, QuoteSource};
use crate::crypto::CryptoPriceProvider;
use crate::equity::{EquityPriceProvider, EquityTier};
use crate::fx::ExchangeRateService;
use crate::providers::{
    AmfiNavSource, BinanceSource, BridgeSource, CoinCapSource, CoinGeckoSource,
    FrankfurterRateSource, YahooChartSource, util::http_client,
};
use crate::store::QuoteStore;
use crate::store::disk::DiskQuoteStore;
use crate::store::memory::MemoryQuoteStore;
use crate::valuation::ValuationAggregator;
use std::sync::Arc;
use tracing::{debug, warn};

/// Opens the on-disk quote store, or an in-memory one when the data
/// directory cannot be used.
pub fn open_store(config: &AppConfig) -> Arc<dyn QuoteStore> {
    let opened = config
        .default_data_path()
        .and_then(|path| DiskQuoteStore::open(&path.join("quotes")));
    match opened {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(error = %e, "Quote store unavailable, prices will not persist");
            Arc::new(MemoryQuoteStore::new())
        }
    }
}

pub fn build_aggregator(config: &AppConfig, store: Arc<dyn QuoteStore>) -> ValuationAggregator {
    let client = http_client(config.refresh.request_timeout());
    let providers = &config.providers;

    let mut tiers = Vec::new();
    if let Some(url) = providers.bridge_url() {
        debug!("Using market data bridge at {}", url);
        let bridge: Arc<dyn QuoteSource> = Arc::new(BridgeSource::new(url, client.clone()));
        tiers.push(EquityTier::primary(bridge));
    }
    let yahoo: Arc<dyn QuoteSource> =
        Arc::new(YahooChartSource::new(providers.yahoo_url(), client.clone()));
    tiers.push(EquityTier::secondary(
        yahoo,
        config.refresh.secondary_calls_per_minute,
        config.refresh.max_concurrent_lookups,
    ));
    let amfi: Arc<dyn QuoteSource> =
        Arc::new(AmfiNavSource::new(providers.amfi_url(), client.clone()));
    let equities = EquityPriceProvider::new(tiers, vec![EquityTier::primary(amfi)], store.clone());

    let rate_source = Arc::new(FrankfurterRateSource::new(
        providers.exchange_rates_url(),
        client.clone(),
    ));
    let coingecko = Arc::new(CoinGeckoSource::new(providers.coingecko_url(), client.clone()));
    let crypto_tiers: Vec<Arc<dyn CryptoSource>> = vec![
        coingecko.clone(),
        Arc::new(CoinCapSource::new(providers.coincap_url(), client.clone())),
        Arc::new(BinanceSource::new(providers.binance_url(), client)),
    ];
    let crypto = CryptoPriceProvider::new(crypto_tiers, &config.crypto_currency, store)
        .with_search(coingecko)
        .with_usd_rates(rate_source.clone());

    ValuationAggregator::new(
        Arc::new(ExchangeRateService::new(rate_source)),
        Arc::new(equities),
        Arc::new(crypto),
    )
    .with_max_concurrent(config.refresh.max_concurrent_lookups)
}
