use tracing::info;

mod test_utils {
    use std::fs;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Mock FRED server answering every observations request with the
    /// same body, regardless of series id.
    pub async fn create_fred_mock_server(mock_response: &str, status: u16) -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/fred/series/observations"))
            .respond_with(ResponseTemplate::new(status).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        mock_server
    }

    pub async fn create_quote_mock_server(charts: &[(&str, String)]) -> MockServer {
        let mock_server = MockServer::start().await;

        for (symbol, body) in charts {
            Mock::given(method("GET"))
                .and(path(format!("/v8/finance/chart/{symbol}")))
                .respond_with(ResponseTemplate::new(200).set_body_string(body.clone()))
                .mount(&mock_server)
                .await;
        }

        mock_server
    }

    pub fn write_config(fred_uri: &str, quotes_uri: &str) -> tempfile::NamedTempFile {
        let config_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
        let config_content = format!(
            r#"
            providers:
              fred:
                base_url: {fred_uri}
                api_key: "integration-test-key"
              quotes:
                base_url: {quotes_uri}
            probe_interval_minutes: 30
        "#
        );
        fs::write(config_file.path(), &config_content).expect("Failed to write config file");
        config_file
    }
}

fn quote_body(price: f64, previous_close: f64) -> String {
    format!(
        r#"{{"chart": {{"result": [{{
            "meta": {{
                "regularMarketPrice": {price},
                "chartPreviousClose": {previous_close},
                "regularMarketTime": {}
            }}
        }}]}}}}"#,
        chrono::Utc::now().timestamp()
    )
}

fn quote_history_body(price: f64, closes: &[f64]) -> String {
    let now = chrono::Utc::now().timestamp();
    let timestamps: Vec<String> = (0..closes.len())
        .map(|i| (now - (closes.len() - i) as i64 * 86_400).to_string())
        .collect();
    let closes: Vec<String> = closes.iter().map(|c| c.to_string()).collect();
    format!(
        r#"{{"chart": {{"result": [{{
            "meta": {{"regularMarketPrice": {price}}},
            "timestamp": [{}],
            "indicators": {{"quote": [{{"close": [{}]}}]}}
        }}]}}}}"#,
        timestamps.join(","),
        closes.join(",")
    )
}

fn fred_history_body(values: &[f64]) -> String {
    let today = chrono::Utc::now().date_naive();
    let observations: Vec<String> = values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let date = today - chrono::Duration::days((values.len() - i) as i64);
            format!(r#"{{"date": "{date}", "value": "{v}"}}"#)
        })
        .collect();
    format!(r#"{{"observations": [{}]}}"#, observations.join(","))
}

#[test_log::test(tokio::test)]
async fn test_full_snapshot_flow_with_mocks() {
    let fred_server = test_utils::create_fred_mock_server(
        r#"{"observations": [
            {"date": "2026-08-01", "value": "4.2"},
            {"date": "2026-07-01", "value": "4.0"}
        ]}"#,
        200,
    )
    .await;
    let quote_server = test_utils::create_quote_mock_server(&[
        ("^VIX", quote_body(17.3, 16.8)),
        ("^GSPC", quote_body(5612.5, 5598.0)),
    ])
    .await;

    let config_file = test_utils::write_config(&fred_server.uri(), &quote_server.uri());

    info!("Running snapshot against mock providers");
    let result = macrolens::run_command(
        macrolens::AppCommand::Snapshot,
        Some(config_file.path().to_str().unwrap()),
    )
    .await;
    assert!(
        result.is_ok(),
        "Snapshot command failed with: {:?}",
        result.err()
    );
}

#[test_log::test(tokio::test)]
async fn test_snapshot_survives_total_fred_outage() {
    // Every FRED request fails; quote data is healthy. The command must
    // still complete, serving fallback values for FRED indicators.
    let fred_server = test_utils::create_fred_mock_server(
        r#"{"error_code": 500, "error_message": "Internal Server Error"}"#,
        500,
    )
    .await;
    let quote_server = test_utils::create_quote_mock_server(&[
        ("^VIX", quote_body(17.3, 16.8)),
        ("^GSPC", quote_body(5612.5, 5598.0)),
    ])
    .await;

    let config_file = test_utils::write_config(&fred_server.uri(), &quote_server.uri());

    let result = macrolens::run_command(
        macrolens::AppCommand::Snapshot,
        Some(config_file.path().to_str().unwrap()),
    )
    .await;
    assert!(
        result.is_ok(),
        "Snapshot must not fail on provider outage: {:?}",
        result.err()
    );
}

#[test_log::test(tokio::test)]
async fn test_full_correlate_flow_with_mocks() {
    let fred_server =
        test_utils::create_fred_mock_server(&fred_history_body(&[4.0, 4.1, 4.3, 4.2, 4.5, 4.4]), 200)
            .await;
    let quote_server = test_utils::create_quote_mock_server(&[
        (
            "^VIX",
            quote_history_body(17.3, &[16.0, 16.5, 17.1, 16.8, 17.5, 17.3]),
        ),
        (
            "^GSPC",
            quote_history_body(5612.5, &[5550.0, 5560.0, 5540.0, 5580.0, 5600.0, 5612.5]),
        ),
    ])
    .await;

    let config_file = test_utils::write_config(&fred_server.uri(), &quote_server.uri());

    let result = macrolens::run_command(
        macrolens::AppCommand::Correlate { min_strength: None },
        Some(config_file.path().to_str().unwrap()),
    )
    .await;
    assert!(
        result.is_ok(),
        "Correlate command failed with: {:?}",
        result.err()
    );
}

#[test_log::test(tokio::test)]
async fn test_full_health_flow_with_mocks() {
    let fred_server = test_utils::create_fred_mock_server(
        r#"{"observations": [{"date": "2026-08-01", "value": "4.2"}]}"#,
        200,
    )
    .await;
    let quote_server =
        test_utils::create_quote_mock_server(&[("^GSPC", quote_body(5612.5, 5598.0))]).await;

    let config_file = test_utils::write_config(&fred_server.uri(), &quote_server.uri());

    let result = macrolens::run_command(
        macrolens::AppCommand::Health { watch: false },
        Some(config_file.path().to_str().unwrap()),
    )
    .await;
    assert!(
        result.is_ok(),
        "Health command failed with: {:?}",
        result.err()
    );
}

#[test_log::test(tokio::test)]
async fn test_fred_client_against_mock() {
    use macrolens::core::indicator::{IndicatorProvider, IndicatorSpec};
    use macrolens::providers::fred::FredClient;

    let fred_server = test_utils::create_fred_mock_server(
        r#"{"observations": [
            {"date": "2026-08-01", "value": "4.2"},
            {"date": "2026-07-01", "value": "4.0"}
        ]}"#,
        200,
    )
    .await;

    let client = FredClient::new(&fred_server.uri(), Some("integration-test-key".to_string()))
        .expect("client construction");

    let spec = macrolens::core::indicator::default_registry()
        .into_iter()
        .find(|s: &IndicatorSpec| s.name == "unemployment_rate")
        .expect("registry entry");
    let value = client.fetch_indicator(&spec).await.expect("fetch");

    info!(?value, "Received indicator value");
    assert_eq!(value.value, Some(4.2));
    assert_eq!(value.source, "FRED");
    assert!(!value.is_fallback);
}
