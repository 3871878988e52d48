//! FRED (Federal Reserve Economic Data) client.
//!
//! FRED is quota-limited and key-authenticated. The client owns the
//! credential: caller-supplied `api_key` parameters are stripped and the
//! configured key is appended last, so no call site can override it, and
//! [`redact_api_key`] masks it before any URL reaches a log line.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::core::cache::TimedCache;
use crate::core::correlation::normalize_series;
use crate::core::error::ProviderError;
use crate::core::health::{HealthState, ProviderProbe};
use crate::core::indicator::{
    IndicatorObservation, IndicatorProvider, IndicatorSource, IndicatorSpec, MetricDataPoint,
    MetricValue,
};

pub const SOURCE_NAME: &str = "FRED";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Minimum spacing between requests in a bulk fetch, to respect the
/// provider's rate limit.
const REQUEST_SPACING: Duration = Duration::from_secs(1);

/// A known-good series used for credential validation and health probes.
const PROBE_SERIES: &str = "UNRATE";

/// Latest-value cache TTL for indicator data.
const INDICATOR_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    fn as_param(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub limit: Option<u32>,
    pub sort_order: Option<SortOrder>,
    pub observation_start: Option<NaiveDate>,
    /// Passed through to the provider after credential stripping.
    pub extra_params: Vec<(String, String)>,
    /// Per-request wall-clock bound; defaults to 10s.
    pub timeout: Option<Duration>,
}

#[derive(Debug, Deserialize)]
pub struct FredSeriesResponse {
    pub observations: Vec<FredRawObservation>,
}

#[derive(Debug, Deserialize)]
pub struct FredRawObservation {
    pub date: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
struct FredErrorBody {
    #[allow(dead_code)]
    error_code: Option<u32>,
    error_message: Option<String>,
}

/// Mask the credential in a URL string before logging it.
pub fn redact_api_key(url: &str) -> String {
    let Some(start) = url.find("api_key=") else {
        return url.to_string();
    };
    let value_start = start + "api_key=".len();
    let value_end = url[value_start..]
        .find('&')
        .map_or(url.len(), |i| value_start + i);
    format!("{}***{}", &url[..value_start], &url[value_end..])
}

/// Parse FRED's raw observation list. The placeholder value `"."` marks a
/// missing print and becomes `None`; change-from-previous is derived from
/// the next observation in the response's own ordering.
pub fn parse_observations(raw: &[FredRawObservation]) -> Vec<IndicatorObservation> {
    raw.iter()
        .enumerate()
        .filter_map(|(i, obs)| {
            let date = NaiveDate::parse_from_str(&obs.date, "%Y-%m-%d").ok()?;
            let value = parse_value(&obs.value);
            let previous = raw.get(i + 1).and_then(|prev| parse_value(&prev.value));
            Some(IndicatorObservation {
                date,
                value,
                change_from_previous: match (value, previous) {
                    (Some(v), Some(p)) => Some(v - p),
                    _ => None,
                },
            })
        })
        .collect()
}

fn parse_value(raw: &str) -> Option<f64> {
    if raw == "." {
        return None;
    }
    raw.parse::<f64>().ok()
}

pub struct FredClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    cache: TimedCache<String, MetricValue>,
}

impl FredClient {
    /// Fails fast when no credential is configured; a missing key is a
    /// startup-time condition, not a per-call one.
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, ProviderError> {
        let api_key = api_key
            .filter(|key| !key.is_empty())
            .ok_or(ProviderError::MissingCredential {
                provider: SOURCE_NAME,
                env_var: crate::core::config::FRED_API_KEY_ENV,
            })?;

        let client = reqwest::Client::builder()
            .user_agent("macrolens/1.0")
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
            cache: TimedCache::new(INDICATOR_TTL),
        })
    }

    /// Fetch raw observations for one series.
    #[instrument(name = "FredSeriesFetch", skip(self, options), fields(series_id = %series_id))]
    pub async fn fetch_series(
        &self,
        series_id: &str,
        options: &FetchOptions,
    ) -> Result<FredSeriesResponse, ProviderError> {
        let endpoint = format!("{}/fred/series/observations", self.base_url);

        let mut params: Vec<(String, String)> = vec![
            ("series_id".to_string(), series_id.to_string()),
            ("file_type".to_string(), "json".to_string()),
        ];
        // The credential is ours to manage: drop any caller-supplied key
        // and append the configured one last.
        params.extend(
            options
                .extra_params
                .iter()
                .filter(|(k, _)| !k.eq_ignore_ascii_case("api_key"))
                .cloned(),
        );
        if let Some(limit) = options.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(order) = options.sort_order {
            params.push(("sort_order".to_string(), order.as_param().to_string()));
        }
        if let Some(start) = options.observation_start {
            params.push((
                "observation_start".to_string(),
                start.format("%Y-%m-%d").to_string(),
            ));
        }
        params.push(("api_key".to_string(), self.api_key.clone()));

        let timeout = options.timeout.unwrap_or(DEFAULT_TIMEOUT);
        debug!(
            url = %redact_api_key(&format!("{endpoint}?series_id={series_id}&api_key={}", self.api_key)),
            "Requesting observations"
        );

        let response = self
            .client
            .get(&endpoint)
            .query(&params)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout {
                        seconds: timeout.as_secs(),
                    }
                } else {
                    ProviderError::Transport(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<FredErrorBody>(&body)
                .ok()
                .and_then(|e| e.error_message)
                .unwrap_or_else(|| body.chars().take(200).collect());
            return Err(ProviderError::Request {
                status: status.as_u16(),
                message,
            });
        }

        let data = response
            .json::<FredSeriesResponse>()
            .await
            .map_err(|e| ProviderError::Unusable(format!("malformed response: {e}")))?;
        Ok(data)
    }

    /// Fetch several series sequentially with a fixed minimum spacing
    /// between requests. A failure on one series does not abort the rest;
    /// the result holds only the series that succeeded.
    pub async fn fetch_series_bulk(
        &self,
        series_ids: &[String],
        options: &FetchOptions,
    ) -> HashMap<String, FredSeriesResponse> {
        let mut results = HashMap::new();
        for (i, series_id) in series_ids.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(REQUEST_SPACING).await;
            }
            match self.fetch_series(series_id, options).await {
                Ok(response) => {
                    results.insert(series_id.clone(), response);
                }
                Err(e) => {
                    warn!(series_id = %series_id, error = %e, "Bulk fetch item failed, continuing");
                }
            }
        }
        results
    }

    /// Check whether the configured credential is accepted. An auth
    /// rejection is a boolean fact; a network failure is transient and is
    /// re-raised rather than conflated with "invalid key".
    pub async fn validate_credential(&self) -> Result<bool, ProviderError> {
        let options = FetchOptions {
            limit: Some(1),
            sort_order: Some(SortOrder::Descending),
            ..Default::default()
        };
        match self.fetch_series(PROBE_SERIES, &options).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_auth_failure() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl IndicatorProvider for FredClient {
    fn source_name(&self) -> &str {
        SOURCE_NAME
    }

    #[instrument(name = "FredIndicatorFetch", skip(self, spec), fields(indicator = %spec.name))]
    async fn fetch_indicator(&self, spec: &IndicatorSpec) -> Result<MetricValue, ProviderError> {
        let IndicatorSource::Fred { series_id } = &spec.source else {
            return Err(ProviderError::Unusable(format!(
                "{} is not a FRED indicator",
                spec.name
            )));
        };

        if let Some(cached) = self.cache.get(&spec.name).await {
            return Ok(cached);
        }

        let options = FetchOptions {
            limit: Some(2),
            sort_order: Some(SortOrder::Descending),
            ..Default::default()
        };
        let response = self.fetch_series(series_id, &options).await?;
        let observations = parse_observations(&response.observations);
        let latest = observations
            .first()
            .ok_or_else(|| ProviderError::Unusable(format!("no observations for {series_id}")))?;
        let value = latest
            .value
            .ok_or_else(|| ProviderError::Unusable(format!("latest {series_id} value is empty")))?;

        let result = MetricValue {
            value: Some(value),
            formatted: spec.unit.format(value),
            date: latest.date.format("%Y-%m-%d").to_string(),
            change: latest.change_from_previous,
            source: SOURCE_NAME.to_string(),
            is_fallback: false,
            error: None,
        };

        self.cache.put(spec.name.clone(), result.clone()).await;
        Ok(result)
    }

    async fn fetch_history(
        &self,
        spec: &IndicatorSpec,
        since: Option<NaiveDate>,
        limit: u32,
    ) -> Result<Vec<MetricDataPoint>, ProviderError> {
        let IndicatorSource::Fred { series_id } = &spec.source else {
            return Err(ProviderError::Unusable(format!(
                "{} is not a FRED indicator",
                spec.name
            )));
        };

        let options = FetchOptions {
            limit: Some(limit),
            sort_order: Some(SortOrder::Ascending),
            observation_start: since,
            ..Default::default()
        };
        let response = self.fetch_series(series_id, &options).await?;

        let points: Vec<MetricDataPoint> = parse_observations(&response.observations)
            .into_iter()
            .filter_map(|obs| {
                let value = obs.value?;
                let midnight = obs.date.and_hms_opt(0, 0, 0)?;
                Some(MetricDataPoint {
                    timestamp_ms: midnight.and_utc().timestamp_millis(),
                    value,
                })
            })
            .collect();

        Ok(normalize_series(&points))
    }
}

#[async_trait]
impl ProviderProbe for FredClient {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn probe(&self) -> Result<HealthState, ProviderError> {
        let options = FetchOptions {
            limit: Some(1),
            sort_order: Some(SortOrder::Descending),
            ..Default::default()
        };
        match self.fetch_series(PROBE_SERIES, &options).await {
            Ok(response) if !response.observations.is_empty() => Ok(HealthState::Healthy),
            // Parseable but missing the expected payload.
            Ok(_) => Ok(HealthState::Degraded),
            Err(e) if e.is_rate_limited() => Ok(HealthState::Degraded),
            Err(e @ ProviderError::Unusable(_)) => {
                tracing::debug!(error = %e, "Probe payload malformed");
                Ok(HealthState::Degraded)
            }
            Err(e) => Err(e),
        }
    }
}
