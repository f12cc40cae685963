pub mod cli;
pub mod core;
pub mod crypto;
pub mod engine;
pub mod equity;
pub mod fx;
pub mod providers;
pub mod refresh;
pub mod store;
pub mod valuation;

use crate::core::config::AppConfig;
use crate::refresh::ValuationLoop;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    /// One valuation pass; `force` drops cached and manual prices first.
    Summary { force: bool },
    Watch,
    Search(String),
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("folio starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!(holdings = config.holdings.len(), "Loaded config");

    let store = engine::open_store(&config);
    let aggregator = Arc::new(engine::build_aggregator(&config, store));

    match command {
        AppCommand::Summary { force } => cli::summary::run(&aggregator, &config, force).await,
        AppCommand::Watch => {
            let period = config.refresh.auto_refresh_period();
            let config = Arc::new(config);
            let valuation_loop = Arc::new(ValuationLoop::new(
                aggregator,
                config.clone(),
                config,
            ));
            cli::watch::run(valuation_loop, period).await
        }
        AppCommand::Search(query) => cli::search::run(aggregator.crypto(), &query).await,
    }
}
