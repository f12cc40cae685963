use super::util::{send_json, with_retry};
use crate::core::error::FetchError;
use crate::core::holding::InstrumentKey;
use crate::core::price::{QuoteSource, Tier};
use crate::core::quote::{MarketPrice, decimal_from_f64};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, instrument};

/// Mutual fund NAV lookup by scheme code. Single source: funds have no
/// secondary channel.
pub struct AmfiNavSource {
    base_url: String,
    client: reqwest::Client,
}

impl AmfiNavSource {
    pub fn new(base_url: &str, client: reqwest::Client) -> Self {
        AmfiNavSource {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AmfiResponse {
    nav: f64,
    date: String,
    #[serde(default)]
    historical_nav: Vec<(String, f64)>,
}

impl AmfiResponse {
    /// Last published NAV strictly before the current NAV date.
    fn previous_nav(&self) -> Option<f64> {
        let current = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").ok();
        let mut history: Vec<(NaiveDate, f64)> = self
            .historical_nav
            .iter()
            .filter_map(|(date_str, nav)| {
                NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
                    .ok()
                    .map(|date| (date, *nav))
            })
            .filter(|(date, nav)| *nav > 0.0 && current.is_none_or(|c| *date < c))
            .collect();
        history.sort_by_key(|(date, _)| *date);
        history.last().map(|(_, nav)| *nav)
    }
}

impl Tier for AmfiNavSource {
    fn name(&self) -> &str {
        "amfi"
    }
}

#[async_trait]
impl QuoteSource for AmfiNavSource {
    #[instrument(name = "AmfiNavFetch", skip(self), fields(scheme = %key.symbol))]
    async fn fetch_quote(&self, key: &InstrumentKey) -> Result<MarketPrice, FetchError> {
        let code = key.symbol.as_str();
        let url = format!("{}/nav/{}", self.base_url, code);
        debug!("Requesting NAV from {}", url);

        let response: AmfiResponse = with_retry(
            || send_json(self.client.get(&url), code),
            2,
            500,
        )
        .await?;

        if response.nav <= 0.0 {
            return Err(FetchError::UnknownInstrument(format!(
                "No NAV published for scheme: {code}"
            )));
        }
        debug!("Fetched NAV for {}: {} ({})", code, response.nav, response.date);

        let nav = decimal_from_f64(response.nav, "nav")?;
        let quote = match response.previous_nav() {
            Some(prev) => MarketPrice::from_previous_close(nav, decimal_from_f64(prev, "nav")?),
            None => MarketPrice::flat(nav),
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

    // Helper function to create a mock server for AMFI provider
    async fn create_amfi_mock_server(
        code: &str,
        mock_response: &str,
        status_code: u16,
    ) -> MockServer {
        let mock_server = MockServer::start().await;
        let expected_path = format!("/nav/{code}");

        Mock::given(method("GET"))
            .and(path(&expected_path))
            .respond_with(ResponseTemplate::new(status_code).set_body_string(mock_response))
            .mount(&mock_server)
            .await;
        mock_server
    }

    fn provider(server: &MockServer) -> AmfiNavSource {
        AmfiNavSource::new(&server.uri(), http_client(Duration::from_secs(5)))
    }

    #[tokio::test]
    async fn test_successful_nav_fetch_without_history() {
        let code = "120503";
        let mock_response = r#"{"nav": 123.45, "date": "2024-01-01", "name": "My Fund"}"#;
        let mock_server = create_amfi_mock_server(code, mock_response, 200).await;

        let result = provider(&mock_server)
            .fetch_quote(&InstrumentKey::new(code, "AMFI"))
            .await
            .unwrap();
        assert_eq!(result.price, dec!(123.45));
        assert_eq!(result.change_absolute, dec!(0));
    }

    #[tokio::test]
    async fn test_daily_change_uses_previous_nav() {
        let code = "120503";
        let mock_response = r#"{
            "nav": 110.0,
            "date": "2024-01-03",
            "historical_nav": [["2024-01-01", 90.0], ["2024-01-02", 100.0], ["2024-01-03", 110.0]]
        }"#;
        let mock_server = create_amfi_mock_server(code, mock_response, 200).await;

        let result = provider(&mock_server)
            .fetch_quote(&InstrumentKey::new(code, "AMFI"))
            .await
            .unwrap();
        assert_eq!(result.price, dec!(110));
        assert_eq!(result.change_absolute, dec!(10));
        assert_eq!(result.change_percent, dec!(10));
    }

    #[tokio::test]
    async fn test_amfi_api_error_response() {
        let code = "120503";
        let mock_server = create_amfi_mock_server(code, "Server Error", 500).await;

        let result = provider(&mock_server)
            .fetch_quote(&InstrumentKey::new(code, "AMFI"))
            .await;
        assert!(matches!(result, Err(FetchError::Network(_))));
    }

    #[tokio::test]
    async fn test_amfi_api_malformed_response() {
        let code = "120503";
        let mock_response = r#"{ "not_nav": "abc" }"#;
        let mock_server = create_amfi_mock_server(code, mock_response, 200).await;

        let result = provider(&mock_server)
            .fetch_quote(&InstrumentKey::new(code, "AMFI"))
            .await;
        let err = result.unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));
        assert!(err.to_string().contains("Failed to parse JSON response for 120503"));
    }

    #[tokio::test]
    async fn test_amfi_api_empty_response() {
        let code = "120503";
        let mock_server = create_amfi_mock_server(code, "", 200).await;

        let result = provider(&mock_server)
            .fetch_quote(&InstrumentKey::new(code, "AMFI"))
            .await;
        assert_eq!(
            result.unwrap_err(),
            FetchError::Malformed(format!("Received empty response for {code}"))
        );
    }
}
