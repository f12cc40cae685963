pub mod amfi_provider;
pub mod binance;
pub mod bridge;
pub mod coincap;
pub mod coingecko;
pub mod frankfurter;
pub mod util;
pub mod yahoo_finance;

pub use amfi_provider::AmfiNavSource;
pub use binance::BinanceSource;
pub use bridge::BridgeSource;
pub use coincap::CoinCapSource;
pub use coingecko::CoinGeckoSource;
pub use frankfurter::FrankfurterRateSource;
pub use yahoo_finance::YahooChartSource;
