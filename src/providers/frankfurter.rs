//! Frankfurter (ECB reference rates) as the live rate table source.

use super::util::send_json;
use crate::core::currency::RateSource;
use crate::core::error::FetchError;
use crate::core::quote::decimal_from_f64;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, instrument};

pub struct FrankfurterRateSource {
    base_url: String,
    client: reqwest::Client,
}

impl FrankfurterRateSource {
    pub fn new(base_url: &str, client: reqwest::Client) -> Self {
        FrankfurterRateSource {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LatestResponse {
    base: String,
    date: String,
    rates: HashMap<String, f64>,
}

#[async_trait]
impl RateSource for FrankfurterRateSource {
    #[instrument(name = "FrankfurterLatest", skip(self))]
    async fn fetch_rates(&self, base: &str) -> Result<HashMap<String, Decimal>, FetchError> {
        let base = base.to_uppercase();
        let url = format!("{}/latest?from={}", self.base_url, base);
        debug!("Requesting rates from {}", url);

        let response: LatestResponse = send_json(self.client.get(&url), "exchange rates").await?;
        if !response.base.eq_ignore_ascii_case(&base) {
            return Err(FetchError::Malformed(format!(
                "asked for {base} rates, got {}",
                response.base
            )));
        }
        if response.rates.is_empty() {
            return Err(FetchError::Malformed("rate table is empty".to_string()));
        }
        debug!("Fetched {} rates as of {}", response.rates.len(), response.date);

        response
            .rates
            .into_iter()
            .map(|(code, rate)| Ok((code.to_uppercase(), decimal_from_f64(rate, &code)?)))
            .collect()
    }
}
