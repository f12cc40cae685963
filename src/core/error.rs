//! Failure kinds raised by provider tiers.
//!
//! None of these cross the provider boundary: each provider turns them into
//! the next fallback tier and, ultimately, a provenance tag on the quote.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Timeout, connection failure, DNS or a non-2xx response.
    #[error("network failure: {0}")]
    Network(String),
    /// Local call budget exhausted; the request was never sent.
    #[error("rate limit exceeded for {0}")]
    RateLimited(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("unknown instrument: {0}")]
    UnknownInstrument(String),
    /// The tier exists in the ladder but cannot serve this request.
    #[error("{0} is unavailable")]
    Unavailable(String),
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Network(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Malformed(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Malformed(err.to_string())
    }
}
