//! The data-access facade exposed to UI/API consumers.
//!
//! Everything here honors one contract: a data-fetch failure becomes
//! degraded data with a visible source label, never an error surfaced to
//! the caller.

use crate::core::correlation::{self, CorrelationMatrix};
use crate::core::freshness::{self, Frequency, FreshnessStatus};
use crate::core::health::HealthAggregator;
use crate::core::indicator::{
    IndicatorProvider, IndicatorSource, IndicatorSpec, MetricDataPoint, MetricValue,
    default_registry,
};
use crate::core::resilience::{Resolver, RetryPolicy};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Series shorter than this are not worth aligning for correlation.
const MIN_RAW_POINTS: usize = 5;

pub struct DataService {
    registry: Vec<IndicatorSpec>,
    fred: Arc<dyn IndicatorProvider>,
    quotes: Arc<dyn IndicatorProvider>,
    resolver: Resolver,
    retry_policy: RetryPolicy,
    health: Arc<HealthAggregator>,
}

impl DataService {
    pub fn new(
        fred: Arc<dyn IndicatorProvider>,
        quotes: Arc<dyn IndicatorProvider>,
        health: Arc<HealthAggregator>,
    ) -> Self {
        Self {
            registry: default_registry(),
            fred,
            quotes,
            resolver: Resolver::new(),
            retry_policy: RetryPolicy::default(),
            health,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn registry(&self) -> &[IndicatorSpec] {
        &self.registry
    }

    pub fn health(&self) -> &Arc<HealthAggregator> {
        &self.health
    }

    fn spec_for(&self, name: &str) -> Option<&IndicatorSpec> {
        self.registry.iter().find(|spec| spec.name == name)
    }

    fn provider_for(&self, spec: &IndicatorSpec) -> &Arc<dyn IndicatorProvider> {
        match spec.source {
            IndicatorSource::Fred { .. } => &self.fred,
            IndicatorSource::MarketQuote { .. } => &self.quotes,
        }
    }

    /// Resolve one indicator. May block on the network; never errors.
    pub async fn get_indicator_value(&self, name: &str) -> MetricValue {
        let Some(spec) = self.spec_for(name) else {
            return unknown_indicator(name);
        };
        let provider = self.provider_for(spec);

        let value = self
            .resolver
            .with_resilience(name, self.retry_policy, || {
                provider.fetch_indicator(spec)
            })
            .await;

        // Feed the health board inline, outside the probe cycle. Cached
        // and fallback data both mean the live path failed.
        let live = !value.is_fallback && value.error.is_none() && !value.source.ends_with("(cached)");
        self.health
            .record_observation(provider.source_name(), live, None)
            .await;

        value
    }

    /// Resolve several indicators sequentially, in the order given.
    /// A failure on one name degrades only that name's entry.
    pub async fn get_bulk_indicator_values(&self, names: &[String]) -> HashMap<String, MetricValue> {
        let mut results = HashMap::new();
        for name in names {
            let value = self.get_indicator_value(name).await;
            results.insert(name.clone(), value);
        }
        results
    }

    /// Historical points for one indicator, ascending by timestamp and
    /// deduplicated. Empty on failure; history has no fallback tier.
    pub async fn get_historical_series(
        &self,
        name: &str,
        since: Option<NaiveDate>,
        limit: u32,
    ) -> Vec<MetricDataPoint> {
        let Some(spec) = self.spec_for(name) else {
            warn!(name, "Unknown indicator requested for history");
            return Vec::new();
        };
        match self.provider_for(spec).fetch_history(spec, since, limit).await {
            Ok(points) => points,
            Err(e) => {
                warn!(name, error = %e, "History fetch failed");
                Vec::new()
            }
        }
    }

    /// Fetch histories for every registry indicator, keeping only series
    /// with enough raw points to be worth aligning.
    pub async fn collect_series(
        &self,
        since: Option<NaiveDate>,
        limit: u32,
    ) -> HashMap<String, Vec<MetricDataPoint>> {
        let mut series = HashMap::new();
        let names: Vec<String> = self.registry.iter().map(|s| s.name.clone()).collect();
        for name in names {
            let points = self.get_historical_series(&name, since, limit).await;
            if points.len() >= MIN_RAW_POINTS {
                series.insert(name, points);
            } else {
                warn!(name, points = points.len(), "Too few points for correlation");
            }
        }
        series
    }

    pub fn compute_correlation_matrix(
        &self,
        series: &HashMap<String, Vec<MetricDataPoint>>,
    ) -> CorrelationMatrix {
        correlation::build_matrix(series)
    }

    pub fn compute_freshness(
        &self,
        name: &str,
        last_updated: Option<DateTime<Utc>>,
        frequency: Frequency,
        market_dependent: bool,
    ) -> FreshnessStatus {
        freshness::classify_at(name, last_updated, frequency, market_dependent, Utc::now())
    }
}

fn unknown_indicator(name: &str) -> MetricValue {
    MetricValue {
        value: None,
        formatted: "N/A".to_string(),
        date: String::new(),
        change: None,
        source: "Error (No Fallback)".to_string(),
        is_fallback: true,
        error: Some(format!("unknown indicator: {name}")),
    }
}
