//! Indicator abstractions and core types.

use crate::core::error::ProviderError;
use crate::core::freshness::Frequency;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// A single dated observation parsed from a provider response.
/// Immutable once created; a missing print (FRED's `"."`) is `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorObservation {
    pub date: NaiveDate,
    pub value: Option<f64>,
    pub change_from_previous: Option<f64>,
}

/// The resolved, display-ready form of an observation. Copied, never
/// mutated in place, as it moves between the cache and fallback layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricValue {
    pub value: Option<f64>,
    pub formatted: String,
    pub date: String,
    pub change: Option<f64>,
    pub source: String,
    pub is_fallback: bool,
    pub error: Option<String>,
}

/// The atomic unit consumed by the correlation engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricDataPoint {
    pub timestamp_ms: i64,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    Percent,
    Index,
    Points,
}

impl Unit {
    pub fn format(&self, value: f64) -> String {
        match self {
            Unit::Percent => format!("{value:.1}%"),
            Unit::Index => format!("{value:.1}"),
            Unit::Points => format!("{value:.2}"),
        }
    }
}

/// Where an indicator's data comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndicatorSource {
    Fred { series_id: String },
    MarketQuote { symbol: String },
}

/// One entry in the indicator registry: the name consumers use, where the
/// data lives, and how to interpret its update cadence.
#[derive(Debug, Clone)]
pub struct IndicatorSpec {
    pub name: String,
    pub display_name: String,
    pub source: IndicatorSource,
    pub frequency: Frequency,
    pub market_dependent: bool,
    pub unit: Unit,
}

impl Display for IndicatorSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.display_name, self.name)
    }
}

#[async_trait]
pub trait IndicatorProvider: Send + Sync {
    /// Human-readable source label, also used as the health-board key.
    fn source_name(&self) -> &str;

    /// Fetch the latest value for an indicator.
    async fn fetch_indicator(&self, spec: &IndicatorSpec) -> Result<MetricValue, ProviderError>;

    /// Fetch a historical series, ascending by timestamp, deduplicated.
    async fn fetch_history(
        &self,
        spec: &IndicatorSpec,
        since: Option<NaiveDate>,
        limit: u32,
    ) -> Result<Vec<MetricDataPoint>, ProviderError>;
}

fn fred(name: &str, display: &str, series: &str, frequency: Frequency, unit: Unit) -> IndicatorSpec {
    IndicatorSpec {
        name: name.to_string(),
        display_name: display.to_string(),
        source: IndicatorSource::Fred {
            series_id: series.to_string(),
        },
        frequency,
        market_dependent: false,
        unit,
    }
}

fn quote(name: &str, display: &str, symbol: &str, unit: Unit) -> IndicatorSpec {
    IndicatorSpec {
        name: name.to_string(),
        display_name: display.to_string(),
        source: IndicatorSource::MarketQuote {
            symbol: symbol.to_string(),
        },
        frequency: Frequency::Daily,
        market_dependent: true,
        unit,
    }
}

/// The built-in set of tracked indicators.
pub fn default_registry() -> Vec<IndicatorSpec> {
    vec![
        fred(
            "unemployment_rate",
            "Unemployment Rate",
            "UNRATE",
            Frequency::Monthly,
            Unit::Percent,
        ),
        fred(
            "cpi",
            "CPI (All Urban Consumers)",
            "CPIAUCSL",
            Frequency::Monthly,
            Unit::Index,
        ),
        fred(
            "fed_funds_rate",
            "Federal Funds Rate",
            "FEDFUNDS",
            Frequency::Monthly,
            Unit::Percent,
        ),
        fred(
            "treasury_10y",
            "10-Year Treasury Yield",
            "DGS10",
            Frequency::Daily,
            Unit::Percent,
        ),
        fred(
            "yield_spread_10y2y",
            "10Y-2Y Treasury Spread",
            "T10Y2Y",
            Frequency::Daily,
            Unit::Percent,
        ),
        fred(
            "gdp_growth",
            "Real GDP Growth",
            "A191RL1Q225SBEA",
            Frequency::Quarterly,
            Unit::Percent,
        ),
        quote("vix", "CBOE Volatility Index", "^VIX", Unit::Index),
        quote("sp500", "S&P 500", "^GSPC", Unit::Points),
    ]
}
