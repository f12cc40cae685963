use super::util::send_json;
use crate::core::error::FetchError;
use crate::core::holding::InstrumentKey;
use crate::core::price::{QuoteSource, Tier};
use crate::core::quote::{MarketPrice, decimal_from_f64};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

/// Public chart API, used as the rate-limited secondary equity channel.
pub struct YahooChartSource {
    base_url: String,
    client: reqwest::Client,
}

impl YahooChartSource {
    pub fn new(base_url: &str, client: reqwest::Client) -> Self {
        YahooChartSource {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

/// Yahoo ticker for a listing: venue suffix for non-US exchanges.
pub fn yahoo_symbol(key: &InstrumentKey) -> String {
    let suffix = match key.exchange.as_str() {
        "NSE" => ".NS",
        "BSE" => ".BO",
        "LSE" => ".L",
        "TSX" => ".TO",
        "ASX" => ".AX",
        "XETRA" => ".DE",
        "EPA" => ".PA",
        "AMS" => ".AS",
        "HKEX" => ".HK",
        "TSE" | "JPX" => ".T",
        "SGX" => ".SI",
        _ => "",
    };
    format!("{}{}", key.symbol, suffix)
}

#[derive(Deserialize, Debug)]
struct YahooPriceResponse {
    chart: PriceChartResult,
}

#[derive(Deserialize, Debug)]
struct PriceChartResult {
    result: Option<Vec<PriceChartItem>>,
}

#[derive(Deserialize, Debug)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Deserialize, Debug)]
struct Quote {
    close: Option<Vec<Option<f64>>>,
}

#[derive(Deserialize, Debug)]
struct PriceChartItem {
    meta: PriceChartMeta,
    indicators: Option<Indicators>,
}

#[derive(Deserialize, Debug)]
struct PriceChartMeta {
    #[serde(alias = "regularMarketPrice")]
    regular_market_price: f64,
    #[serde(rename = "previousClose")]
    previous_close: Option<f64>,
    #[serde(rename = "chartPreviousClose")]
    chart_previous_close: Option<f64>,
}

impl PriceChartItem {
    /// Previous session close: the second-to-last bar, else the meta field.
    fn previous_close(&self) -> Option<f64> {
        let from_bars = self
            .indicators
            .as_ref()
            .and_then(|inds| inds.quote.first())
            .and_then(|q| q.close.as_ref())
            .and_then(|closes| {
                let valid: Vec<f64> = closes.iter().flatten().copied().collect();
                (valid.len() >= 2).then(|| valid[valid.len() - 2])
            });
        from_bars
            .or(self.meta.previous_close)
            .or(self.meta.chart_previous_close)
    }
}

impl Tier for YahooChartSource {
    fn name(&self) -> &str {
        "yahoo"
    }
}

#[async_trait]
impl QuoteSource for YahooChartSource {
    #[instrument(
        name = "YahooQuoteFetch",
        skip(self),
        fields(instrument = %key)
    )]
    async fn fetch_quote(&self, key: &InstrumentKey) -> Result<MarketPrice, FetchError> {
        let symbol = yahoo_symbol(key);
        let url = format!(
            "{}/v8/finance/chart/{}?interval=1d&range=5d",
            self.base_url, symbol
        );
        debug!("Requesting price data from {}", url);

        let data: YahooPriceResponse = send_json(self.client.get(&url), &symbol).await?;
        let item = data
            .chart
            .result
            .and_then(|items| items.into_iter().next())
            .ok_or_else(|| {
                FetchError::UnknownInstrument(format!("No price data found for symbol: {symbol}"))
            })?;

        let price = decimal_from_f64(item.meta.regular_market_price, "regularMarketPrice")?;
        let quote = match item.previous_close() {
            Some(prev) if prev > 0.0 => {
                MarketPrice::from_previous_close(price, decimal_from_f64(prev, "previousClose")?)
            }
            _ => MarketPrice::flat(price),
        };
        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::util::http_client;
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub async fn create_mock_server(symbol: &str, status: u16, mock_response: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        let request_path = format!("/v8/finance/chart/{symbol}");

        Mock::given(method("GET"))
            .and(path(request_path))
            .respond_with(ResponseTemplate::new(status).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        mock_server
    }

    fn provider(server: &MockServer) -> YahooChartSource {
        YahooChartSource::new(&server.uri(), http_client(Duration::from_secs(5)))
    }

    #[test]
    fn test_yahoo_symbol_suffixes() {
        assert_eq!(yahoo_symbol(&InstrumentKey::new("reliance", "nse")), "RELIANCE.NS");
        assert_eq!(yahoo_symbol(&InstrumentKey::new("AAPL", "NASDAQ")), "AAPL");
        assert_eq!(yahoo_symbol(&InstrumentKey::new("VOD", "LSE")), "VOD.L");
        assert_eq!(yahoo_symbol(&InstrumentKey::new("MSFT", "")), "MSFT");
    }

    #[tokio::test]
    async fn test_successful_price_fetch_uses_previous_bar() {
        let mock_response = r#"{
            "chart": {
                "result": [{
                    "meta": {
                        "regularMarketPrice": 150.0,
                        "currency": "USD",
                        "chartPreviousClose": 120.0
                    },
                    "timestamp": [1, 2, 3],
                    "indicators": { "quote": [{ "close": [140.0, null, 125.0, 150.0] }] }
                }]
            }
        }"#;
        let server = create_mock_server("AAPL", 200, mock_response).await;

        let result = provider(&server)
            .fetch_quote(&InstrumentKey::new("AAPL", "NASDAQ"))
            .await
            .unwrap();
        assert_eq!(result.price, dec!(150));
        assert_eq!(result.change_absolute, dec!(25));
        assert_eq!(result.change_percent, dec!(20));
    }

    #[tokio::test]
    async fn test_meta_only_response_uses_previous_close() {
        let mock_response = r#"{
            "chart": {
                "result": [{
                    "meta": { "regularMarketPrice": 110.0, "previousClose": 100.0 }
                }]
            }
        }"#;
        let server = create_mock_server("TCS.NS", 200, mock_response).await;

        let result = provider(&server)
            .fetch_quote(&InstrumentKey::new("TCS", "NSE"))
            .await
            .unwrap();
        assert_eq!(result.price, dec!(110));
        assert_eq!(result.change_percent, dec!(10));
    }

    #[tokio::test]
    async fn test_no_price_result_data() {
        let mock_response = r#"{"chart": {"result": []}}"#;
        let server = create_mock_server("INVALID", 200, mock_response).await;

        let result = provider(&server)
            .fetch_quote(&InstrumentKey::new("INVALID", ""))
            .await;
        assert_eq!(
            result.unwrap_err(),
            FetchError::UnknownInstrument("No price data found for symbol: INVALID".to_string())
        );
    }

    #[tokio::test]
    async fn test_not_found_is_a_network_failure() {
        let mock_response = r#"{"chart": {"result": null, "error": {"code": "Not Found"}}}"#;
        let server = create_mock_server("NOPE", 404, mock_response).await;

        let result = provider(&server)
            .fetch_quote(&InstrumentKey::new("NOPE", ""))
            .await;
        assert!(matches!(result, Err(FetchError::Network(_))));
    }

    #[tokio::test]
    async fn test_malformed_response() {
        let server = create_mock_server("AAPL", 200, r#"{"charts": {}}"#).await;
        let result = provider(&server)
            .fetch_quote(&InstrumentKey::new("AAPL", ""))
            .await;
        assert!(matches!(result, Err(FetchError::Malformed(_))));
    }
}
