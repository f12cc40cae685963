//! Portfolio valuation: grouping, price dispatch, currency conversion and
//! portfolio-level figures.

use crate::core::holding::{AssetClass, Holding, IngestContext, InstrumentKey, RawHolding};
use crate::core::quote::{PriceQuote, Provenance};
use crate::crypto::CryptoPriceProvider;
use crate::equity::EquityPriceProvider;
use crate::fx::{ExchangeRateService, RateSnapshot, RateState};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

pub const DEFAULT_MAX_CONCURRENT_LOOKUPS: usize = 8;

/// Monetary figures for one holding, in a single currency.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Figures {
    pub current_value: Decimal,
    pub total_invested: Decimal,
    pub profit_loss: Decimal,
    pub profit_loss_percent: Decimal,
    pub daily_gain: Decimal,
}

impl Figures {
    pub fn compute(quantity: Decimal, total_invested: Decimal, quote: &PriceQuote) -> Self {
        let current_value = quantity * quote.price;
        let profit_loss = current_value - total_invested;
        Self {
            current_value,
            total_invested,
            profit_loss,
            profit_loss_percent: percent_of(profit_loss, total_invested),
            daily_gain: quote.change_absolute * quantity,
        }
    }

    /// Re-expresses every amount through `convert`; the percentage is unit-free.
    pub fn converted(&self, convert: impl Fn(Decimal) -> Decimal) -> Self {
        Self {
            current_value: convert(self.current_value),
            total_invested: convert(self.total_invested),
            profit_loss: convert(self.profit_loss),
            profit_loss_percent: self.profit_loss_percent,
            daily_gain: convert(self.daily_gain),
        }
    }
}

fn percent_of(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        Decimal::ZERO
    } else {
        part / whole * Decimal::ONE_HUNDRED
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValuedHolding {
    pub holding: Holding,
    pub quote: PriceQuote,
    /// Figures in the instrument's own currency.
    pub native: Figures,
    /// Figures in the display currency.
    pub display: Figures,
    /// Share of the portfolio's display-currency value, in percent.
    pub weight: Decimal,
}

impl ValuedHolding {
    pub fn day_change_percent(&self) -> Decimal {
        self.quote.change_percent
    }

    /// Holdings with no price or no cost basis carry no meaningful return.
    fn is_rankable(&self) -> bool {
        !self.quote.is_unavailable() && !self.display.total_invested.is_zero()
    }
}

/// Names a holding singled out in the totals.
#[derive(Debug, Clone, PartialEq)]
pub struct Performer {
    pub key: InstrumentKey,
    pub name: String,
    pub percent: Decimal,
}

impl Performer {
    fn of(holding: &ValuedHolding, percent: Decimal) -> Self {
        Self {
            key: holding.holding.key.clone(),
            name: holding.holding.display_name(),
            percent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PortfolioTotals {
    pub current_value: Decimal,
    pub total_invested: Decimal,
    pub profit_loss: Decimal,
    pub profit_loss_percent: Decimal,
    pub daily_gain: Decimal,
    pub daily_gain_percent: Decimal,
    pub best_performer: Option<Performer>,
    pub worst_performer: Option<Performer>,
    pub best_daily_mover: Option<Performer>,
    pub worst_daily_mover: Option<Performer>,
}

impl PortfolioTotals {
    /// Sums display-currency figures over any subset of valued holdings.
    /// Ties in the rankings go to the holding seen first.
    pub fn from_holdings<'a>(holdings: impl IntoIterator<Item = &'a ValuedHolding>) -> Self {
        let mut totals = PortfolioTotals::default();
        let mut best: Option<(&ValuedHolding, Decimal)> = None;
        let mut worst: Option<(&ValuedHolding, Decimal)> = None;
        let mut gainer: Option<(&ValuedHolding, Decimal)> = None;
        let mut loser: Option<(&ValuedHolding, Decimal)> = None;

        for vh in holdings {
            totals.current_value += vh.display.current_value;
            totals.total_invested += vh.display.total_invested;
            totals.profit_loss += vh.display.profit_loss;
            totals.daily_gain += vh.display.daily_gain;

            if vh.is_rankable() {
                let pct = vh.display.profit_loss_percent;
                if best.is_none_or(|(_, b)| pct > b) {
                    best = Some((vh, pct));
                }
                if worst.is_none_or(|(_, w)| pct < w) {
                    worst = Some((vh, pct));
                }
            }

            if !vh.quote.is_unavailable() {
                let day = vh.day_change_percent();
                if day > Decimal::ZERO && gainer.is_none_or(|(_, g)| day > g) {
                    gainer = Some((vh, day));
                }
                if day < Decimal::ZERO && loser.is_none_or(|(_, l)| day < l) {
                    loser = Some((vh, day));
                }
            }
        }

        totals.profit_loss_percent = percent_of(totals.profit_loss, totals.total_invested);
        let previous_value = totals.current_value - totals.daily_gain;
        totals.daily_gain_percent = percent_of(totals.daily_gain, previous_value);
        totals.best_performer = best.map(|(vh, pct)| Performer::of(vh, pct));
        totals.worst_performer = worst.map(|(vh, pct)| Performer::of(vh, pct));
        totals.best_daily_mover = gainer.map(|(vh, pct)| Performer::of(vh, pct));
        totals.worst_daily_mover = loser.map(|(vh, pct)| Performer::of(vh, pct));
        totals
    }
}

/// Output of one aggregation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Valuation {
    pub display_currency: String,
    pub holdings: Vec<ValuedHolding>,
    pub totals: PortfolioTotals,
    pub rates: RateState,
    pub generated_at: DateTime<Utc>,
}

impl Valuation {
    pub fn totals_for(&self, asset_class: AssetClass) -> PortfolioTotals {
        PortfolioTotals::from_holdings(
            self.holdings
                .iter()
                .filter(|vh| vh.holding.asset_class == asset_class),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }
}

/// A forced refresh: the new valuation plus non-blocking per-holding notes.
#[derive(Debug, Clone)]
pub struct RefreshReport {
    pub valuation: Valuation,
    pub warnings: Vec<String>,
}

pub struct ValuationAggregator {
    rates: Arc<ExchangeRateService>,
    equities: Arc<EquityPriceProvider>,
    crypto: Arc<CryptoPriceProvider>,
    max_concurrent: usize,
}

impl ValuationAggregator {
    pub fn new(
        rates: Arc<ExchangeRateService>,
        equities: Arc<EquityPriceProvider>,
        crypto: Arc<CryptoPriceProvider>,
    ) -> Self {
        Self {
            rates,
            equities,
            crypto,
            max_concurrent: DEFAULT_MAX_CONCURRENT_LOOKUPS,
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn rates(&self) -> &Arc<ExchangeRateService> {
        &self.rates
    }

    pub fn equities(&self) -> &Arc<EquityPriceProvider> {
        &self.equities
    }

    pub fn crypto(&self) -> &Arc<CryptoPriceProvider> {
        &self.crypto
    }

    /// Values every holding. Never fails: a holding nothing could price is
    /// kept with zero value and an `Unavailable` quote.
    #[instrument(name = "Aggregate", skip(self, raw), fields(records = raw.len()))]
    pub async fn aggregate(&self, raw: Vec<RawHolding>, display_currency: &str) -> Valuation {
        let display_currency = display_currency.trim().to_uppercase();
        self.rates.refresh().await;
        let snapshot = self.rates.snapshot();

        let ctx = IngestContext {
            display_currency: display_currency.clone(),
            crypto_currency: self.crypto.quote_currency().to_string(),
        };
        let holdings = group(raw.into_iter().map(|r| r.into_holding(&ctx)));
        debug!("{} holdings after grouping", holdings.len());

        let quotes = self.resolve_quotes(&holdings, &snapshot).await;

        let mut valued: Vec<ValuedHolding> = holdings
            .into_iter()
            .zip(quotes)
            .map(|(holding, quote)| value_holding(holding, quote, &snapshot, &display_currency))
            .collect();

        let total: Decimal = valued.iter().map(|vh| vh.display.current_value).sum();
        for vh in &mut valued {
            vh.weight = percent_of(vh.display.current_value, total);
        }

        Valuation {
            totals: PortfolioTotals::from_holdings(&valued),
            display_currency,
            holdings: valued,
            rates: snapshot.state,
            generated_at: Utc::now(),
        }
    }

    /// One quote per holding, in holding order.
    async fn resolve_quotes(&self, holdings: &[Holding], snapshot: &RateSnapshot) -> Vec<PriceQuote> {
        let listed: Vec<(usize, InstrumentKey, AssetClass)> = holdings
            .iter()
            .enumerate()
            .filter(|(_, h)| h.asset_class.is_grouped())
            .map(|(index, h)| (index, h.key.clone(), h.asset_class))
            .collect();
        let crypto_ids: Vec<String> = holdings
            .iter()
            .filter(|h| h.asset_class == AssetClass::Crypto)
            .map(|h| h.key.symbol.clone())
            .collect();

        let equities = self.equities.clone();
        let listed_lookups = stream::iter(listed)
            .map(move |(index, key, asset_class)| {
                let equities = equities.clone();
                async move { (index, equities.quote_for(&key, asset_class).await) }
            })
            .buffer_unordered(self.max_concurrent)
            .collect::<Vec<_>>();
        let crypto_lookup = async {
            if crypto_ids.is_empty() {
                HashMap::new()
            } else {
                self.crypto.get_prices(&crypto_ids).await
            }
        };
        let (listed_quotes, crypto_quotes) = tokio::join!(listed_lookups, crypto_lookup);

        let mut by_index: HashMap<usize, PriceQuote> = listed_quotes.into_iter().collect();
        holdings
            .iter()
            .enumerate()
            .map(|(index, holding)| match holding.asset_class {
                AssetClass::Equity | AssetClass::MutualFund => by_index
                    .remove(&index)
                    .unwrap_or_else(PriceQuote::unavailable),
                AssetClass::Crypto => crypto_quotes
                    .get(&holding.key.symbol)
                    .cloned()
                    .unwrap_or_else(PriceQuote::unavailable),
                AssetClass::Forex => forex_quote(holding, snapshot),
                AssetClass::Commodity => commodity_quote(holding, snapshot),
                AssetClass::FixedAsset => fixed_asset_quote(holding, snapshot),
            })
            .collect()
    }

    /// Drops every cached price and manual override, forces a rate refresh
    /// and values the portfolio again.
    pub async fn force_refresh(&self, raw: Vec<RawHolding>, display_currency: &str) -> RefreshReport {
        info!("Cache cleared, fetching fresh prices");
        self.equities.clear_cache().await;
        self.equities.clear_manual_overrides().await;
        self.crypto.clear_cache().await;
        self.rates.force_refresh().await;

        let valuation = self.aggregate(raw, display_currency).await;
        let warnings = valuation
            .holdings
            .iter()
            .filter_map(|vh| {
                let note = match vh.quote.provenance {
                    Provenance::CachedStale => "showing last known price",
                    Provenance::HardcodedFallback => "showing demo price",
                    Provenance::Unavailable => "no price available",
                    _ => return None,
                };
                Some(format!("{}: {}", vh.holding.display_name(), note))
            })
            .collect();
        RefreshReport {
            valuation,
            warnings,
        }
    }
}

/// Merges equity and fund records for the same instrument, keeping the
/// order in which instruments first appear. Other classes stay 1:1.
fn group(holdings: impl Iterator<Item = Holding>) -> Vec<Holding> {
    let mut grouped: Vec<Holding> = Vec::new();
    let mut positions: HashMap<(AssetClass, InstrumentKey), usize> = HashMap::new();
    for holding in holdings {
        if !holding.asset_class.is_grouped() {
            grouped.push(holding);
            continue;
        }
        let id = (holding.asset_class, holding.key.clone());
        match positions.get(&id) {
            Some(&pos) => grouped[pos].absorb(holding),
            None => {
                positions.insert(id, grouped.len());
                grouped.push(holding);
            }
        }
    }
    grouped
}

/// Cost basis in the holding's own currency.
fn invested_in_native(holding: &Holding, snapshot: &RateSnapshot) -> Decimal {
    holding
        .lots
        .iter()
        .map(|lot| snapshot.convert(lot.cost(), &lot.currency, &holding.currency))
        .sum()
}

fn value_holding(
    holding: Holding,
    quote: PriceQuote,
    snapshot: &RateSnapshot,
    display_currency: &str,
) -> ValuedHolding {
    let invested = invested_in_native(&holding, snapshot);
    let native = Figures::compute(holding.quantity, invested, &quote);
    let display = native.converted(|amount| snapshot.convert(amount, &holding.currency, display_currency));
    ValuedHolding {
        holding,
        quote,
        native,
        display,
        weight: Decimal::ZERO,
    }
}

/// One unit of the held currency, expressed in the holding's currency.
fn forex_quote(holding: &Holding, snapshot: &RateSnapshot) -> PriceQuote {
    if !snapshot.table.contains(&holding.key.symbol) {
        return PriceQuote::unavailable();
    }
    let price = snapshot.convert(Decimal::ONE, &holding.key.symbol, &holding.currency);
    PriceQuote::new(price, Decimal::ZERO, Decimal::ZERO, snapshot.state.provenance())
}

/// Priced from the rate table when it quotes the commodity code, otherwise
/// from the user's own valuation.
fn commodity_quote(holding: &Holding, snapshot: &RateSnapshot) -> PriceQuote {
    if snapshot.table.contains(&holding.key.symbol) {
        let price = snapshot.convert(Decimal::ONE, &holding.key.symbol, &holding.currency);
        return PriceQuote::new(price, Decimal::ZERO, Decimal::ZERO, snapshot.state.provenance());
    }
    match holding.current_value {
        Some(value) => PriceQuote::manual(unit_value(value, holding.quantity)),
        None => PriceQuote::unavailable(),
    }
}

/// User-entered value, or the cost basis when none was entered.
fn fixed_asset_quote(holding: &Holding, snapshot: &RateSnapshot) -> PriceQuote {
    let value = holding
        .current_value
        .unwrap_or_else(|| invested_in_native(holding, snapshot));
    PriceQuote::manual(unit_value(value, holding.quantity))
}

fn unit_value(total: Decimal, quantity: Decimal) -> Decimal {
    if quantity.is_zero() {
        total
    } else {
        total / quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::currency::RateSource;
    use crate::core::error::FetchError;
    use crate::core::holding::{LegacyHolding, RawLot};
    use crate::core::price::{CryptoSource, QuoteSource, Tier};
    use crate::core::quote::MarketPrice;
    use crate::equity::EquityTier;
    use crate::store::memory::MemoryQuoteStore;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    struct FixedQuotes(HashMap<String, Decimal>);

    impl Tier for FixedQuotes {
        fn name(&self) -> &str {
            "fixed"
        }
    }

    #[async_trait]
    impl QuoteSource for FixedQuotes {
        async fn fetch_quote(&self, key: &InstrumentKey) -> Result<MarketPrice, FetchError> {
            self.0
                .get(&key.symbol)
                .map(|p| MarketPrice::from_previous_close(*p, *p * dec!(0.8)))
                .ok_or_else(|| FetchError::UnknownInstrument(key.to_string()))
        }
    }

    struct FixedCoins(HashMap<String, Decimal>);

    impl Tier for FixedCoins {
        fn name(&self) -> &str {
            "coins"
        }
    }

    #[async_trait]
    impl CryptoSource for FixedCoins {
        async fn fetch_batch(
            &self,
            ids: &[String],
            _quote_currency: &str,
        ) -> Result<HashMap<String, MarketPrice>, FetchError> {
            let batch: HashMap<String, MarketPrice> = ids
                .iter()
                .filter_map(|id| self.0.get(id).map(|p| (id.clone(), MarketPrice::flat(*p))))
                .collect();
            if batch.is_empty() {
                return Err(FetchError::UnknownInstrument(ids.join(",")));
            }
            Ok(batch)
        }
    }

    struct FixedRates;

    #[async_trait]
    impl RateSource for FixedRates {
        async fn fetch_rates(&self, _base: &str) -> Result<HashMap<String, Decimal>, FetchError> {
            Ok(HashMap::from([
                ("INR".to_string(), dec!(80)),
                ("EUR".to_string(), dec!(0.5)),
                ("GBP".to_string(), dec!(0.8)),
            ]))
        }
    }

    fn aggregator(equities: &[(&str, Decimal)], coins: &[(&str, Decimal)]) -> ValuationAggregator {
        let store = Arc::new(MemoryQuoteStore::new());
        let quotes = FixedQuotes(equities.iter().map(|(s, p)| (s.to_string(), *p)).collect());
        let coins = FixedCoins(coins.iter().map(|(s, p)| (s.to_string(), *p)).collect());
        ValuationAggregator::new(
            Arc::new(ExchangeRateService::new(Arc::new(FixedRates))),
            Arc::new(EquityPriceProvider::new(
                vec![EquityTier::primary(Arc::new(quotes))],
                Vec::new(),
                store.clone(),
            )),
            Arc::new(CryptoPriceProvider::new(vec![Arc::new(coins)], "USD", store)),
        )
    }

    fn lot(quantity: Decimal, price: Decimal) -> RawLot {
        RawLot {
            quantity,
            unit_price: price,
            currency: None,
            date: None,
        }
    }

    fn raw(symbol: &str, exchange: &str, class: AssetClass) -> RawHolding {
        RawHolding {
            symbol: symbol.to_string(),
            exchange: (!exchange.is_empty()).then(|| exchange.to_string()),
            asset_class: class,
            name: None,
            currency: None,
            lots: Vec::new(),
            holding: None,
            current_value: None,
        }
    }

    #[tokio::test]
    async fn test_grouped_lots_worked_example() {
        let aggregator = aggregator(&[("ACME", dec!(150))], &[]);
        let mut first = raw("ACME", "NSE", AssetClass::Equity);
        first.lots = vec![lot(dec!(10), dec!(100))];
        let mut second = raw("acme", "nse", AssetClass::Equity);
        second.lots = vec![lot(dec!(5), dec!(120))];

        let valuation = aggregator.aggregate(vec![first, second], "INR").await;
        assert_eq!(valuation.holdings.len(), 1);

        let acme = &valuation.holdings[0];
        assert_eq!(acme.holding.quantity, dec!(15));
        assert_eq!(acme.native.total_invested, dec!(1600));
        assert_eq!(acme.native.current_value, dec!(2250));
        assert_eq!(acme.native.profit_loss, dec!(650));
        assert_eq!(acme.native.profit_loss_percent, dec!(40.625));
        assert_eq!(acme.display, acme.native);
        assert_eq!(acme.weight, dec!(100));
        assert_eq!(valuation.totals.current_value, dec!(2250));
    }

    #[tokio::test]
    async fn test_aggregate_runs_on_spawned_task() {
        let aggregator = Arc::new(aggregator(&[("ACME", dec!(150)), ("INFY", dec!(10))], &[]));
        let mut acme = raw("ACME", "NSE", AssetClass::Equity);
        acme.lots = vec![lot(dec!(1), dec!(100))];
        let mut infy = raw("INFY", "NSE", AssetClass::Equity);
        infy.lots = vec![lot(dec!(3), dec!(10))];

        let task = {
            let aggregator = aggregator.clone();
            tokio::spawn(async move { aggregator.aggregate(vec![acme, infy], "INR").await })
        };
        let valuation = task.await.unwrap();
        assert_eq!(valuation.holdings.len(), 2);
        assert_eq!(valuation.holdings[0].quote.price, dec!(150));
        assert_eq!(valuation.holdings[1].native.current_value, dec!(30));
    }

    #[tokio::test]
    async fn test_empty_portfolio_has_zero_totals() {
        let aggregator = aggregator(&[], &[]);
        let valuation = aggregator.aggregate(Vec::new(), "USD").await;
        assert!(valuation.is_empty());
        assert_eq!(valuation.totals, PortfolioTotals::default());
    }

    #[tokio::test]
    async fn test_display_currency_conversion_and_daily_gain() {
        let aggregator = aggregator(&[("AAPL", dec!(100))], &[]);
        let mut apple = raw("AAPL", "NASDAQ", AssetClass::Equity);
        apple.lots = vec![lot(dec!(2), dec!(50))];

        let valuation = aggregator.aggregate(vec![apple], "EUR").await;
        let vh = &valuation.holdings[0];
        assert_eq!(vh.holding.currency, "USD");
        assert_eq!(vh.native.current_value, dec!(200));
        assert_eq!(vh.native.daily_gain, dec!(40));
        assert_eq!(vh.display.current_value, dec!(100));
        assert_eq!(vh.display.daily_gain, dec!(20));
        assert_eq!(vh.display.profit_loss_percent, dec!(100));
        assert_eq!(valuation.rates, RateState::Live);
    }

    #[tokio::test]
    async fn test_unavailable_holding_is_kept_but_not_ranked() {
        let aggregator = aggregator(&[("ACME", dec!(150))], &[("bitcoin", dec!(100))]);
        let mut acme = raw("ACME", "NSE", AssetClass::Equity);
        acme.lots = vec![lot(dec!(1), dec!(100))];
        let mut ghost = raw("GHOST", "NSE", AssetClass::Equity);
        ghost.lots = vec![lot(dec!(4), dec!(25))];
        let mut btc = raw("bitcoin", "", AssetClass::Crypto);
        btc.holding = Some(LegacyHolding::Structured {
            quantity: dec!(2),
            avg_price: Some(dec!(100)),
            invested: None,
        });

        let valuation = aggregator.aggregate(vec![acme, ghost, btc], "INR").await;
        assert_eq!(valuation.holdings.len(), 3);

        let ghost = &valuation.holdings[1];
        assert!(ghost.quote.is_unavailable());
        assert_eq!(ghost.native.current_value, Decimal::ZERO);
        assert_eq!(ghost.native.profit_loss, dec!(-100));

        let totals = &valuation.totals;
        let best = totals.best_performer.as_ref().unwrap();
        assert_eq!(best.key, InstrumentKey::new("ACME", "NSE"));
        let worst = totals.worst_performer.as_ref().unwrap();
        assert_eq!(worst.key, InstrumentKey::crypto("bitcoin"));
        assert_eq!(worst.percent, Decimal::ZERO);
        assert_eq!(totals.best_daily_mover.as_ref().unwrap().key, best.key);
        assert!(totals.worst_daily_mover.is_none());

        let crypto = valuation.totals_for(AssetClass::Crypto);
        assert_eq!(crypto.current_value, dec!(16000));
    }

    #[tokio::test]
    async fn test_forex_commodity_and_fixed_assets() {
        let aggregator = aggregator(&[], &[]);
        let mut pounds = raw("GBP", "", AssetClass::Forex);
        pounds.lots = vec![lot(dec!(100), dec!(1))];
        let mut gold = raw("GOLD", "", AssetClass::Commodity);
        gold.holding = Some(LegacyHolding::Number(dec!(2)));
        gold.current_value = Some(dec!(300));
        let mut house = raw("House", "", AssetClass::FixedAsset);
        house.current_value = Some(dec!(5000));

        let valuation = aggregator.aggregate(vec![pounds, gold, house], "USD").await;

        let fx = &valuation.holdings[0];
        assert_eq!(fx.quote.provenance, Provenance::PrimaryApi);
        assert_eq!(fx.native.current_value, dec!(100));
        assert_eq!(fx.display.current_value, dec!(125));

        let gold = &valuation.holdings[1];
        assert_eq!(gold.quote.provenance, Provenance::Manual);
        assert_eq!(gold.quote.price, dec!(150));

        let house = &valuation.holdings[2];
        assert_eq!(house.holding.quantity, Decimal::ONE);
        assert_eq!(house.display.current_value, dec!(5000));
        assert_eq!(house.native.total_invested, Decimal::ZERO);
        assert_eq!(house.native.profit_loss_percent, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_force_refresh_reports_non_fresh_holdings() {
        let aggregator = aggregator(&[("ACME", dec!(150))], &[]);
        aggregator
            .equities()
            .set_manual_price("ACME", "NSE", dec!(1))
            .await;
        let mut acme = raw("ACME", "NSE", AssetClass::Equity);
        acme.lots = vec![lot(dec!(1), dec!(100))];
        let mut apple = raw("AAPL", "NASDAQ", AssetClass::Equity);
        apple.lots = vec![lot(dec!(1), dec!(100))];

        let report = aggregator.force_refresh(vec![acme, apple], "USD").await;
        assert_eq!(report.valuation.holdings[0].quote.price, dec!(150));
        assert_eq!(report.warnings, vec!["AAPL:NASDAQ: showing demo price".to_string()]);
    }
}
