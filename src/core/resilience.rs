//! Retry and fallback cascade around indicator fetches.
//!
//! Every externally observable read goes through [`Resolver::with_resilience`],
//! which turns any provider failure into degraded-but-labelled data. The
//! cascade is total: live fetch → fallback cache → static seed → sentinel.

use crate::core::cache::TimedCache;
use crate::core::error::ProviderError;
use crate::core::indicator::MetricValue;
use chrono::{NaiveDate, Utc};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Live data older than this is not worth caching or returning as-is.
/// Note this bound is independent of the per-frequency freshness
/// thresholds and can disagree with them for monthly series.
const MAX_USABLE_AGE_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            delay_ms: 1000,
        }
    }
}

/// Verdict on a fetched value, keeping the cascade's branching auditable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Usability {
    /// Cache it and hand it to the caller.
    Usable,
    /// A refetch might produce a better answer.
    Retry,
    /// The provider simply has no recent data; retrying is pointless.
    Fallback,
}

/// Judge whether a fetched value should be served, refetched, or replaced
/// by fallback data.
pub fn assess(value: &MetricValue, today: NaiveDate) -> Usability {
    if value.error.is_some() || value.value.is_none() {
        return Usability::Retry;
    }
    if let Ok(date) = NaiveDate::parse_from_str(&value.date, "%Y-%m-%d") {
        if today.signed_duration_since(date).num_days() > MAX_USABLE_AGE_DAYS {
            return Usability::Fallback;
        }
    }
    Usability::Usable
}

/// Hard-coded seed values for well-known indicators, used when both the
/// live path and the fallback cache come up empty.
pub fn static_seed(name: &str) -> Option<MetricValue> {
    let (value, formatted, source) = match name {
        "unemployment_rate" => (4.1, "4.1%", "FRED"),
        "cpi" => (314.2, "314.2", "FRED"),
        "fed_funds_rate" => (5.3, "5.3%", "FRED"),
        "treasury_10y" => (4.2, "4.2%", "FRED"),
        "yield_spread_10y2y" => (0.1, "0.1%", "FRED"),
        "gdp_growth" => (2.8, "2.8%", "FRED"),
        "vix" => (16.5, "16.5", "Yahoo Finance"),
        "sp500" => (5600.0, "5600.00", "Yahoo Finance"),
        _ => return None,
    };
    Some(MetricValue {
        value: Some(value),
        formatted: formatted.to_string(),
        date: String::new(),
        change: None,
        source: format!("{source} (Fallback)"),
        is_fallback: true,
        error: None,
    })
}

pub struct Resolver {
    // 24h fallback tier, longer-lived than the providers' own caches.
    fallback_cache: TimedCache<String, MetricValue>,
}

impl Resolver {
    pub fn new() -> Self {
        Self {
            fallback_cache: TimedCache::new(Duration::from_secs(24 * 60 * 60)),
        }
    }

    /// Run `operation` with bounded retries and a total fallback cascade.
    /// Never returns an error to the caller; a fetch failure becomes
    /// degraded data with a visible source label.
    pub async fn with_resilience<F, Fut>(
        &self,
        key: &str,
        policy: RetryPolicy,
        mut operation: F,
    ) -> MetricValue
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<MetricValue, ProviderError>>,
    {
        // Assigned on every non-returning match arm before either break.
        let mut last_error: Option<String>;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => match assess(&value, Utc::now().date_naive()) {
                    Usability::Usable => {
                        self.fallback_cache.put(key.to_string(), value.clone()).await;
                        return value;
                    }
                    Usability::Retry => {
                        debug!(key, attempt, "Fetched value unusable, will retry");
                        last_error = Some(format!("unusable data for {key}"));
                    }
                    Usability::Fallback => {
                        warn!(key, date = %value.date, "Fetched value too old, falling back");
                        last_error = Some(format!("data for {key} older than {MAX_USABLE_AGE_DAYS} days"));
                        break;
                    }
                },
                Err(e) => {
                    debug!(key, attempt, error = %e, "Fetch attempt failed");
                    last_error = Some(e.to_string());
                }
            }

            if attempt > policy.retries {
                break;
            }
            // Linearly increasing delay between attempts.
            sleep(Duration::from_millis(policy.delay_ms * u64::from(attempt))).await;
        }

        self.fall_back(key, last_error).await
    }

    async fn fall_back(&self, key: &str, error: Option<String>) -> MetricValue {
        if let Some(mut cached) = self.fallback_cache.get(&key.to_string()).await {
            debug!(key, "Serving cached value after fetch failure");
            cached.source.push_str(" (cached)");
            return cached;
        }

        if let Some(seed) = static_seed(key) {
            warn!(key, "Serving static fallback value");
            return seed;
        }

        warn!(key, "No fallback available");
        MetricValue {
            value: None,
            formatted: "N/A".to_string(),
            date: String::new(),
            change: None,
            source: "Error (No Fallback)".to_string(),
            is_fallback: true,
            error,
        }
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}
