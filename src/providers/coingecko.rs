//! CoinGecko: best-coverage crypto aggregator, first tier for crypto prices
//! and the only coin search backend.

use super::util::send_json;
use crate::core::error::FetchError;
use crate::core::price::{CoinSearch, CoinSearchHit, CryptoSource, Tier};
use crate::core::quote::{MarketPrice, decimal_from_f64};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, instrument};

pub struct CoinGeckoSource {
    base_url: String,
    client: reqwest::Client,
}

impl CoinGeckoSource {
    pub fn new(base_url: &str, client: reqwest::Client) -> Self {
        CoinGeckoSource {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

/// `{"bitcoin": {"usd": 42000.0, "usd_24h_change": 1.2}}`
type SimplePriceResponse = HashMap<String, HashMap<String, Option<f64>>>;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    coins: Vec<SearchCoin>,
}

#[derive(Debug, Deserialize)]
struct SearchCoin {
    id: String,
    name: String,
    symbol: String,
    market_cap_rank: Option<u32>,
}

impl Tier for CoinGeckoSource {
    fn name(&self) -> &str {
        "coingecko"
    }
}

#[async_trait]
impl CryptoSource for CoinGeckoSource {
    #[instrument(name = "CoinGeckoBatch", skip(self), fields(count = ids.len()))]
    async fn fetch_batch(
        &self,
        ids: &[String],
        quote_currency: &str,
    ) -> Result<HashMap<String, MarketPrice>, FetchError> {
        let vs = quote_currency.to_lowercase();
        let url = reqwest::Url::parse_with_params(
            &format!("{}/simple/price", self.base_url),
            &[
                ("ids", ids.join(",")),
                ("vs_currencies", vs.clone()),
                ("include_24hr_change", "true".to_string()),
            ],
        )
        .map_err(|e| FetchError::Unavailable(format!("coingecko url: {e}")))?;
        debug!("Requesting prices from {}", url);

        let data: SimplePriceResponse = send_json(self.client.get(url), "coingecko").await?;
        let change_key = format!("{vs}_24h_change");

        let mut prices = HashMap::new();
        for id in ids {
            let Some(fields) = data.get(id) else {
                continue;
            };
            let Some(Some(price)) = fields.get(&vs) else {
                continue;
            };
            let price = decimal_from_f64(*price, "price")?;
            let quote = match fields.get(&change_key).copied().flatten() {
                Some(pct) => MarketPrice::from_change_percent(price, decimal_from_f64(pct, &change_key)?),
                None => MarketPrice::flat(price),
            };
            prices.insert(id.clone(), quote);
        }

        if prices.is_empty() {
            return Err(FetchError::UnknownInstrument(format!(
                "coingecko returned no prices for {}",
                ids.join(",")
            )));
        }
        Ok(prices)
    }
}

#[async_trait]
impl CoinSearch for CoinGeckoSource {
    #[instrument(name = "CoinGeckoSearch", skip(self))]
    async fn search(&self, query: &str) -> Result<Vec<CoinSearchHit>, FetchError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/search", self.base_url),
            &[("query", query)],
        )
        .map_err(|e| FetchError::Unavailable(format!("coingecko url: {e}")))?;

        let data: SearchResponse = send_json(self.client.get(url), query).await?;
        Ok(data
            .coins
            .into_iter()
            .map(|c| CoinSearchHit {
                id: c.id,
                name: c.name,
                symbol: c.symbol.to_uppercase(),
                market_cap_rank: c.market_cap_rank,
            })
            .collect())
    }
}
