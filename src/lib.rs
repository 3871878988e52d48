pub mod cli;
pub mod core;
pub mod providers;

pub use crate::core::config;

use crate::core::config::AppConfig;
use crate::core::correlation::Strength;
use crate::core::health::{HealthAggregator, ProviderProbe};
use crate::core::indicator::IndicatorProvider;
use crate::core::service::DataService;
use crate::providers::fred::FredClient;
use crate::providers::quotes::QuoteClient;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    Snapshot,
    Correlate { min_strength: Option<Strength> },
    Health { watch: bool },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("Indicator tracker starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let service = build_service(&config)?;

    match command {
        AppCommand::Snapshot => cli::snapshot::run(&service).await,
        AppCommand::Correlate { min_strength } => cli::correlate::run(&service, min_strength).await,
        AppCommand::Health { watch } => {
            let interval_minutes = config.probe_interval_minutes.unwrap_or(30);
            cli::health::run(&service, watch, interval_minutes).await
        }
    }
}

/// Composition root: every component is constructed here and injected
/// explicitly, so tests can build isolated instances per case.
fn build_service(config: &AppConfig) -> Result<DataService> {
    let fred_base = config
        .providers
        .fred
        .as_ref()
        .map_or("https://api.stlouisfed.org", |p| &p.base_url);
    let quotes_base = config
        .providers
        .quotes
        .as_ref()
        .map_or("https://query1.finance.yahoo.com", |p| &p.base_url);

    // A missing credential aborts startup; it is never a per-call error.
    let fred = Arc::new(FredClient::new(fred_base, config.fred_api_key())?);
    let quotes = Arc::new(QuoteClient::new(quotes_base)?);

    let health = Arc::new(HealthAggregator::new(vec![
        Arc::clone(&fred) as Arc<dyn ProviderProbe>,
        Arc::clone(&quotes) as Arc<dyn ProviderProbe>,
    ]));

    Ok(DataService::new(
        fred as Arc<dyn IndicatorProvider>,
        quotes as Arc<dyn IndicatorProvider>,
        health,
    ))
}
