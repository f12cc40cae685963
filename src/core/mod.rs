//! Core domain types and abstractions

pub mod cache;
pub mod config;
pub mod currency;
pub mod error;
pub mod fallback;
pub mod holding;
pub mod limiter;
pub mod log;
pub mod price;
pub mod quote;

// Re-export main types for cleaner imports
pub use currency::{RateSource, RateTable};
pub use error::FetchError;
pub use holding::{AssetClass, Holding, InstrumentKey, PurchaseLot, RawHolding};
pub use price::{CoinSearch, CoinSearchHit, CryptoSource, QuoteSource, Tier};
pub use quote::{MarketPrice, PriceQuote, Provenance};
