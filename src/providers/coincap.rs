//! CoinCap: alternate aggregator, USD-only quotes sent as decimal strings.

use super::util::send_json;
use crate::core::error::FetchError;
use crate::core::price::{CryptoSource, Tier};
use crate::core::quote::{MarketPrice, decimal_from_str};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, instrument};

pub struct CoinCapSource {
    base_url: String,
    client: reqwest::Client,
}

impl CoinCapSource {
    pub fn new(base_url: &str, client: reqwest::Client) -> Self {
        CoinCapSource {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AssetsResponse {
    data: Vec<CoinCapAsset>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoinCapAsset {
    id: String,
    price_usd: Option<String>,
    #[serde(rename = "changePercent24Hr")]
    change_percent_24hr: Option<String>,
}

impl Tier for CoinCapSource {
    fn name(&self) -> &str {
        "coincap"
    }
}

#[async_trait]
impl CryptoSource for CoinCapSource {
    #[instrument(name = "CoinCapBatch", skip(self, _quote_currency), fields(count = ids.len()))]
    async fn fetch_batch(
        &self,
        ids: &[String],
        _quote_currency: &str,
    ) -> Result<HashMap<String, MarketPrice>, FetchError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/assets", self.base_url),
            &[("ids", ids.join(","))],
        )
        .map_err(|e| FetchError::Unavailable(format!("coincap url: {e}")))?;
        debug!("Requesting prices from {}", url);

        let response: AssetsResponse = send_json(self.client.get(url), "coincap").await?;

        let mut prices = HashMap::new();
        for asset in response.data {
            if !ids.contains(&asset.id) {
                continue;
            }
            let Some(raw_price) = asset.price_usd.as_deref() else {
                continue;
            };
            let price = decimal_from_str(raw_price, "priceUsd")?;
            let quote = match asset.change_percent_24hr.as_deref() {
                Some(pct) => {
                    MarketPrice::from_change_percent(price, decimal_from_str(pct, "changePercent24Hr")?)
                }
                None => MarketPrice::flat(price),
            };
            prices.insert(asset.id, quote);
        }

        if prices.is_empty() {
            return Err(FetchError::UnknownInstrument(format!(
                "coincap returned no prices for {}",
                ids.join(",")
            )));
        }
        Ok(prices)
    }

    fn quotes_in_usd(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::util::http_client;
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source(server: &MockServer) -> CoinCapSource {
        CoinCapSource::new(&server.uri(), http_client(Duration::from_secs(5)))
    }

    #[tokio::test]
    async fn test_string_prices_are_parsed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/assets"))
            .and(query_param("ids", "bitcoin,ethereum"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"data": [
                    {"id": "bitcoin", "symbol": "BTC", "priceUsd": "42000.50", "changePercent24Hr": "-1.5"},
                    {"id": "ethereum", "symbol": "ETH", "priceUsd": "2500", "changePercent24Hr": null}
                ], "timestamp": 1}"#,
            ))
            .mount(&server)
            .await;

        let ids = vec!["bitcoin".to_string(), "ethereum".to_string()];
        let prices = source(&server).fetch_batch(&ids, "EUR").await.unwrap();
        assert_eq!(prices["bitcoin"].price, dec!(42000.50));
        assert_eq!(prices["bitcoin"].change_percent, dec!(-1.5));
        assert_eq!(prices["ethereum"].price, dec!(2500));
        assert!(source(&server).quotes_in_usd());
    }

    #[tokio::test]
    async fn test_garbage_price_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/assets"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"data": [{"id": "bitcoin", "priceUsd": "n/a"}]}"#,
            ))
            .mount(&server)
            .await;

        let result = source(&server).fetch_batch(&["bitcoin".to_string()], "USD").await;
        assert!(matches!(result, Err(FetchError::Malformed(_))));
    }
}
