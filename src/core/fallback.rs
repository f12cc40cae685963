//! Ordered tier walk: try each strategy in turn, stop at the first success.

use super::error::FetchError;
use super::price::Tier;
use std::future::Future;
use tracing::{debug, warn};

#[derive(Debug)]
pub enum Resolution<T> {
    Resolved { value: T, tier: usize },
    Exhausted(Vec<FetchError>),
}

/// Walks `tiers` in order, returning the first success together with the
/// index of the tier that produced it.
pub async fn attempt_in_order<'a, S, T, F, Fut>(tiers: &'a [S], mut attempt: F) -> Resolution<T>
where
    S: Tier,
    F: FnMut(&'a S) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut errors = Vec::with_capacity(tiers.len());
    for (index, tier) in tiers.iter().enumerate() {
        match attempt(tier).await {
            Ok(value) => {
                debug!(tier = tier.name(), "Tier resolved");
                return Resolution::Resolved { value, tier: index };
            }
            Err(FetchError::RateLimited(name)) => {
                debug!(tier = %name, "Tier skipped, call budget exhausted");
                errors.push(FetchError::RateLimited(name));
            }
            Err(e) => {
                warn!(tier = tier.name(), error = %e, "Tier failed, falling through");
                errors.push(e);
            }
        }
    }
    Resolution::Exhausted(errors)
}
