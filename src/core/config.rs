use super::holding::RawHolding;
use crate::store::{HoldingsSource, SettingsSource};
use anyhow::{Context, Result};
use async_trait::async_trait;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_YAHOO_URL: &str = "https://query1.finance.yahoo.com";
pub const DEFAULT_AMFI_URL: &str = "https://mf.captnemo.in";
pub const DEFAULT_COINGECKO_URL: &str = "https://api.coingecko.com/api/v3";
pub const DEFAULT_COINCAP_URL: &str = "https://api.coincap.io/v2";
pub const DEFAULT_BINANCE_URL: &str = "https://api.binance.com";
pub const DEFAULT_EXCHANGE_RATES_URL: &str = "https://api.frankfurter.app";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct UserSettings {
    pub display_currency: String,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            display_currency: "USD".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderEndpoint {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProvidersConfig {
    /// Local market-data bridge. Absent unless the host application runs one.
    pub bridge: Option<ProviderEndpoint>,
    pub yahoo: Option<ProviderEndpoint>,
    pub amfi: Option<ProviderEndpoint>,
    pub coingecko: Option<ProviderEndpoint>,
    pub coincap: Option<ProviderEndpoint>,
    pub binance: Option<ProviderEndpoint>,
    pub exchange_rates: Option<ProviderEndpoint>,
}

fn url_or<'a>(endpoint: &'a Option<ProviderEndpoint>, default: &'a str) -> &'a str {
    endpoint.as_ref().map_or(default, |p| p.base_url.as_str())
}

impl ProvidersConfig {
    pub fn bridge_url(&self) -> Option<&str> {
        self.bridge.as_ref().map(|p| p.base_url.as_str())
    }

    pub fn yahoo_url(&self) -> &str {
        url_or(&self.yahoo, DEFAULT_YAHOO_URL)
    }

    pub fn amfi_url(&self) -> &str {
        url_or(&self.amfi, DEFAULT_AMFI_URL)
    }

    pub fn coingecko_url(&self) -> &str {
        url_or(&self.coingecko, DEFAULT_COINGECKO_URL)
    }

    pub fn coincap_url(&self) -> &str {
        url_or(&self.coincap, DEFAULT_COINCAP_URL)
    }

    pub fn binance_url(&self) -> &str {
        url_or(&self.binance, DEFAULT_BINANCE_URL)
    }

    pub fn exchange_rates_url(&self) -> &str {
        url_or(&self.exchange_rates, DEFAULT_EXCHANGE_RATES_URL)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RefreshConfig {
    pub auto_refresh_secs: u64,
    pub request_timeout_secs: u64,
    pub secondary_calls_per_minute: usize,
    pub max_concurrent_lookups: usize,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            auto_refresh_secs: 30,
            request_timeout_secs: 10,
            secondary_calls_per_minute: 55,
            max_concurrent_lookups: 8,
        }
    }
}

impl RefreshConfig {
    pub fn auto_refresh_period(&self) -> Duration {
        Duration::from_secs(self.auto_refresh_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

fn default_crypto_currency() -> String {
    "USD".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub holdings: Vec<RawHolding>,
    #[serde(default)]
    pub settings: UserSettings,
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// Currency crypto prices are quoted in.
    #[serde(default = "default_crypto_currency")]
    pub crypto_currency: String,
    #[serde(default)]
    pub refresh: RefreshConfig,
    pub data_path: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "folio", "folio")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("dev", "folio", "folio")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}

#[async_trait]
impl HoldingsSource for AppConfig {
    async fn get_holdings(&self) -> Vec<RawHolding> {
        self.holdings.clone()
    }
}

#[async_trait]
impl SettingsSource for AppConfig {
    async fn get_user_settings(&self) -> UserSettings {
        self.settings.clone()
    }
}
