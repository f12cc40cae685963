use super::util::send_json;
use crate::core::error::FetchError;
use crate::core::holding::InstrumentKey;
use crate::core::price::{QuoteSource, Tier};
use crate::core::quote::{MarketPrice, decimal_from_f64};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

/// In-process market-data bridge run by the host application. Broad coverage
/// and no call budget, but only present when the host provides it.
pub struct BridgeSource {
    base_url: String,
    client: reqwest::Client,
}

impl BridgeSource {
    pub fn new(base_url: &str, client: reqwest::Client) -> Self {
        BridgeSource {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BridgeQuote {
    price: Option<f64>,
    change: Option<f64>,
    change_percent: Option<f64>,
    previous_close: Option<f64>,
}

impl Tier for BridgeSource {
    fn name(&self) -> &str {
        "bridge"
    }
}

#[async_trait]
impl QuoteSource for BridgeSource {
    #[instrument(name = "BridgeQuoteFetch", skip(self), fields(instrument = %key))]
    async fn fetch_quote(&self, key: &InstrumentKey) -> Result<MarketPrice, FetchError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/quote/{}", self.base_url, key.symbol),
            &[("exchange", key.exchange.as_str())],
        )
        .map_err(|e| FetchError::Unavailable(format!("bridge url: {e}")))?;
        debug!("Requesting quote from {}", url);

        let quote: BridgeQuote = send_json(self.client.get(url), &key.to_string()).await?;
        let price = match quote.price {
            Some(p) if p > 0.0 => decimal_from_f64(p, "price")?,
            _ => {
                return Err(FetchError::UnknownInstrument(format!(
                    "No price data found for symbol: {key}"
                )));
            }
        };

        let market = match (quote.change, quote.change_percent, quote.previous_close) {
            (Some(change), Some(pct), _) => MarketPrice {
                price,
                change_absolute: decimal_from_f64(change, "change")?,
                change_percent: decimal_from_f64(pct, "changePercent")?,
            },
            (_, _, Some(prev)) if prev > 0.0 => {
                MarketPrice::from_previous_close(price, decimal_from_f64(prev, "previousClose")?)
            }
            (_, Some(pct), _) => {
                MarketPrice::from_change_percent(price, decimal_from_f64(pct, "changePercent")?)
            }
            _ => MarketPrice::flat(price),
        };
        Ok(market)
    }
}
