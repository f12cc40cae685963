use crate::core::error::FetchError;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = "folio/0.1";

/// Client shared by all tiers; the timeout bounds every call so no tier can
/// block a valuation pass indefinitely.
pub fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            debug!("Falling back to default HTTP client: {}", e);
            reqwest::Client::new()
        })
}

/// Sends `request` and decodes a JSON body. Non-2xx responses are network
/// failures, unexpected bodies are malformed responses.
pub async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    what: &str,
) -> Result<T, FetchError> {
    let response = request
        .send()
        .await
        .map_err(|e| FetchError::Network(format!("Request error for {what}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Network(format!("HTTP error: {status} for {what}")));
    }

    let text = response
        .text()
        .await
        .map_err(|e| FetchError::Network(format!("Failed to read body for {what}: {e}")))?;
    if text.trim().is_empty() {
        return Err(FetchError::Malformed(format!("Received empty response for {what}")));
    }

    serde_json::from_str(&text)
        .map_err(|e| FetchError::Malformed(format!("Failed to parse JSON response for {what}: {e}")))
}

/// Retries an async operation on network failures only
///
/// # Parameters
/// - `operation`: Closure returning a future
/// - `retries`: Number of retry attempts (total runs = 1 initial + retries)
/// - `delay_ms`: Milliseconds between retry attempts
pub async fn with_retry<F, Fut, T>(
    mut operation: F,
    retries: usize,
    delay_ms: u64,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) => {
                if attempt > retries || !err.is_retryable() {
                    return Err(err);
                }
                debug!(
                    "Attempt {}/{} failed: {}. Retrying...",
                    attempt, retries, err
                );
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
