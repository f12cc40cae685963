//! Binance 24h ticker: exchange quotes against USDT for a fixed set of coins.

use super::util::send_json;
use crate::core::error::FetchError;
use crate::core::price::{CryptoSource, Tier};
use crate::core::quote::{MarketPrice, decimal_from_str};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, instrument};

pub struct BinanceSource {
    base_url: String,
    client: reqwest::Client,
}

impl BinanceSource {
    pub fn new(base_url: &str, client: reqwest::Client) -> Self {
        BinanceSource {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

/// Ticker for a coin id. Ids outside this table are not tradable here.
pub fn ticker_for(id: &str) -> Option<&'static str> {
    let ticker = match id {
        "bitcoin" => "BTCUSDT",
        "ethereum" => "ETHUSDT",
        "binancecoin" => "BNBUSDT",
        "solana" => "SOLUSDT",
        "ripple" => "XRPUSDT",
        "cardano" => "ADAUSDT",
        "dogecoin" => "DOGEUSDT",
        "polkadot" => "DOTUSDT",
        "litecoin" => "LTCUSDT",
        "chainlink" => "LINKUSDT",
        "avalanche-2" => "AVAXUSDT",
        "tron" => "TRXUSDT",
        "shiba-inu" => "SHIBUSDT",
        "cosmos" => "ATOMUSDT",
        "uniswap" => "UNIUSDT",
        "stellar" => "XLMUSDT",
        "near" => "NEARUSDT",
        _ => return None,
    };
    Some(ticker)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker24h {
    symbol: String,
    last_price: String,
    price_change: Option<String>,
    price_change_percent: Option<String>,
}

impl Tier for BinanceSource {
    fn name(&self) -> &str {
        "binance"
    }
}

#[async_trait]
impl CryptoSource for BinanceSource {
    #[instrument(name = "BinanceBatch", skip(self, _quote_currency), fields(count = ids.len()))]
    async fn fetch_batch(
        &self,
        ids: &[String],
        _quote_currency: &str,
    ) -> Result<HashMap<String, MarketPrice>, FetchError> {
        let by_ticker: HashMap<&'static str, &String> = ids
            .iter()
            .filter_map(|id| ticker_for(id).map(|t| (t, id)))
            .collect();
        if by_ticker.is_empty() {
            return Err(FetchError::UnknownInstrument(format!(
                "binance lists none of {}",
                ids.join(",")
            )));
        }

        let mut tickers: Vec<&str> = by_ticker.keys().copied().collect();
        tickers.sort_unstable();
        let symbols = format!(
            "[{}]",
            tickers
                .iter()
                .map(|t| format!("\"{t}\""))
                .collect::<Vec<_>>()
                .join(",")
        );
        let url = reqwest::Url::parse_with_params(
            &format!("{}/api/v3/ticker/24hr", self.base_url),
            &[("symbols", symbols.as_str())],
        )
        .map_err(|e| FetchError::Unavailable(format!("binance url: {e}")))?;
        debug!("Requesting tickers from {}", url);

        let response: Vec<Ticker24h> = send_json(self.client.get(url), "binance").await?;

        let mut prices = HashMap::new();
        for ticker in response {
            let Some(id) = by_ticker.get(ticker.symbol.as_str()) else {
                continue;
            };
            let price = decimal_from_str(&ticker.last_price, "lastPrice")?;
            let quote = match (ticker.price_change.as_deref(), ticker.price_change_percent.as_deref()) {
                (Some(change), Some(pct)) => MarketPrice {
                    price,
                    change_absolute: decimal_from_str(change, "priceChange")?,
                    change_percent: decimal_from_str(pct, "priceChangePercent")?,
                },
                (None, Some(pct)) => {
                    MarketPrice::from_change_percent(price, decimal_from_str(pct, "priceChangePercent")?)
                }
                _ => MarketPrice::flat(price),
            };
            prices.insert((*id).clone(), quote);
        }

        if prices.is_empty() {
            return Err(FetchError::Malformed("binance returned no tickers".to_string()));
        }
        Ok(prices)
    }

    fn quotes_in_usd(&self) -> bool {
        true
    }
}
