use folio::core::config::AppConfig;
use folio::core::holding::AssetClass;
use folio::core::quote::Provenance;
use folio::engine::{build_aggregator, open_store};
use folio::valuation::ValuationAggregator;
use rust_decimal_macros::dec;
use std::fs;
use tempfile::TempDir;
use tracing::info;
use wiremock::MockServer;

mod test_utils {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub async fn mock_json(server: &MockServer, url_path: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(url_path))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    /// Serves every upstream the engine talks to from one mock server.
    pub async fn create_market_server() -> MockServer {
        let server = MockServer::start().await;
        mock_json(
            &server,
            "/latest",
            r#"{"amount": 1.0, "base": "USD", "date": "2024-01-15", "rates": {"INR": 80, "EUR": 0.5}}"#,
        )
        .await;
        mock_json(
            &server,
            "/v8/finance/chart/ACME.NS",
            r#"{"chart": {"result": [{"meta": {"regularMarketPrice": 150.0, "previousClose": 120.0}}]}}"#,
        )
        .await;
        mock_json(
            &server,
            "/nav/120503",
            r#"{"nav": 110.0, "date": "2024-01-15", "historical_nav": [["2024-01-12", 100.0]]}"#,
        )
        .await;
        mock_json(
            &server,
            "/simple/price",
            r#"{"bitcoin": {"usd": 50000.0, "usd_24h_change": 2.5}}"#,
        )
        .await;
        server
    }
}

const HOLDINGS: &str = r#"
holdings:
  - symbol: "ACME"
    exchange: "NSE"
    lots:
      - { quantity: 10, price: 100 }
  - symbol: "acme"
    exchange: "nse"
    holding:
      quantity: 5
      avg_price: 120
  - symbol: "120503"
    type: mutual_fund
    holding: 10
  - symbol: "bitcoin"
    type: crypto
    holding:
      quantity: 0.5
      invested: 20000
settings:
  display_currency: "INR"
"#;

fn write_config(dir: &TempDir, server: &MockServer, holdings: &str) -> std::path::PathBuf {
    let uri = server.uri();
    let content = format!(
        r#"{holdings}
providers:
  yahoo:
    base_url: "{uri}"
  amfi:
    base_url: "{uri}"
  coingecko:
    base_url: "{uri}"
  coincap:
    base_url: "{uri}"
  binance:
    base_url: "{uri}"
  exchange_rates:
    base_url: "{uri}"
data_path: "{data}"
refresh:
  request_timeout_secs: 5
"#,
        data = dir.path().join("data").display(),
    );
    let config_path = dir.path().join("config.yaml");
    fs::write(&config_path, content).expect("Failed to write config file");
    config_path
}

fn engine(dir: &TempDir, server: &MockServer) -> (AppConfig, ValuationAggregator) {
    let config_path = write_config(dir, server, HOLDINGS);
    let config = AppConfig::load_from_path(&config_path).expect("config should load");
    let aggregator = build_aggregator(&config, open_store(&config));
    (config, aggregator)
}

#[test_log::test(tokio::test)]
async fn test_full_app_flow_with_mock() {
    let server = test_utils::create_market_server().await;
    let dir = TempDir::new().unwrap();
    let config_path = write_config(&dir, &server, HOLDINGS);

    let result = folio::run_command(
        folio::AppCommand::Summary { force: false },
        Some(config_path.to_str().unwrap()),
    )
    .await;
    assert!(
        result.is_ok(),
        "Summary command failed with: {:?}",
        result.err()
    );
}

#[test_log::test(tokio::test)]
async fn test_empty_portfolio_summary() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config_path = write_config(&dir, &server, "holdings: []");

    let result = folio::run_command(
        folio::AppCommand::Summary { force: false },
        Some(config_path.to_str().unwrap()),
    )
    .await;
    assert!(result.is_ok(), "Empty summary failed: {:?}", result.err());
}

#[test_log::test(tokio::test)]
async fn test_valuation_against_mocked_providers() {
    let server = test_utils::create_market_server().await;
    let dir = TempDir::new().unwrap();
    let (config, aggregator) = engine(&dir, &server);

    let valuation = aggregator
        .aggregate(config.holdings.clone(), &config.settings.display_currency)
        .await;
    info!(holdings = valuation.holdings.len(), "Valuation complete");
    assert_eq!(valuation.holdings.len(), 3);

    let acme = &valuation.holdings[0];
    assert_eq!(acme.quote.provenance, Provenance::SecondaryApi);
    assert_eq!(acme.holding.quantity, dec!(15));
    assert_eq!(acme.native.current_value, dec!(2250));
    assert_eq!(acme.native.total_invested, dec!(1600));
    assert_eq!(acme.native.profit_loss, dec!(650));
    assert_eq!(acme.native.profit_loss_percent, dec!(40.625));
    assert_eq!(acme.native.daily_gain, dec!(450));

    let fund = &valuation.holdings[1];
    assert_eq!(fund.holding.asset_class, AssetClass::MutualFund);
    assert_eq!(fund.quote.price, dec!(110));
    assert_eq!(fund.quote.change_percent, dec!(10));
    assert_eq!(fund.display.current_value, dec!(1100));

    let btc = &valuation.holdings[2];
    assert_eq!(btc.quote.provenance, Provenance::PrimaryApi);
    assert_eq!(btc.holding.currency, "USD");
    assert_eq!(btc.native.current_value, dec!(25000));
    assert_eq!(btc.display.current_value, dec!(2000000));
    assert_eq!(btc.display.profit_loss, dec!(400000));

    assert_eq!(
        valuation.totals.current_value,
        dec!(2250) + dec!(1100) + dec!(2000000)
    );
    let crypto = valuation.totals_for(AssetClass::Crypto);
    assert_eq!(crypto.current_value, dec!(2000000));
}

#[test_log::test(tokio::test)]
async fn test_outage_falls_back_to_stored_quotes() {
    let server = test_utils::create_market_server().await;
    let dir = TempDir::new().unwrap();
    let (config, aggregator) = engine(&dir, &server);
    let currency = config.settings.display_currency.clone();

    aggregator.aggregate(config.holdings.clone(), &currency).await;

    // Every upstream now answers 404.
    server.reset().await;
    let report = aggregator.force_refresh(config.holdings.clone(), &currency).await;
    let valuation = &report.valuation;

    let acme = &valuation.holdings[0];
    assert_eq!(acme.quote.provenance, Provenance::CachedStale);
    assert!(acme.quote.is_stale);
    assert_eq!(acme.quote.price, dec!(150));

    let btc = &valuation.holdings[2];
    assert_eq!(btc.quote.provenance, Provenance::CachedStale);
    assert_eq!(btc.quote.price, dec!(50000));

    assert_eq!(report.warnings.len(), 3);
    assert!(report.warnings.iter().all(|w| w.contains("last known price")));
}

#[test_log::test(tokio::test)]
async fn test_manual_price_takes_precedence() {
    let server = test_utils::create_market_server().await;
    let dir = TempDir::new().unwrap();
    let (config, aggregator) = engine(&dir, &server);

    aggregator
        .equities()
        .set_manual_price("ACME", "NSE", dec!(200))
        .await;
    let valuation = aggregator
        .aggregate(config.holdings.clone(), &config.settings.display_currency)
        .await;

    let acme = &valuation.holdings[0];
    assert_eq!(acme.quote.provenance, Provenance::Manual);
    assert_eq!(acme.native.current_value, dec!(3000));

    let yahoo_calls = server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path().starts_with("/v8/finance/chart"))
        .count();
    assert_eq!(yahoo_calls, 0);
}

#[test_log::test(tokio::test)]
async fn test_coin_search_against_mock() {
    let server = MockServer::start().await;
    test_utils::mock_json(
        &server,
        "/search",
        r#"{"coins": [{"id": "bitcoin", "name": "Bitcoin", "symbol": "btc", "market_cap_rank": 1}]}"#,
    )
    .await;
    let dir = TempDir::new().unwrap();
    let (_, aggregator) = engine(&dir, &server);

    let hits = aggregator.crypto().search("bit").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].symbol, "BTC");

    let config_path = dir.path().join("config.yaml");
    let result = folio::run_command(
        folio::AppCommand::Search("bit".to_string()),
        Some(config_path.to_str().unwrap()),
    )
    .await;
    assert!(result.is_ok(), "Search command failed: {:?}", result.err());
}
