//! Staleness classification for indicator data.
//!
//! Freshness is recomputed from inputs on every read; nothing here is
//! cached. The only subtlety is market-hours awareness: outside trading
//! hours a daily market metric is expected to look 12–16 hours old, and
//! that must not read as "aging".

use chrono::{DateTime, Datelike, Duration, NaiveTime, Timelike, Utc, Weekday};
use chrono_tz::America::New_York;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
}

impl Frequency {
    /// (fresh, aging) thresholds in hours; beyond aging is stale.
    pub fn thresholds_hours(&self) -> (f64, f64) {
        match self {
            Frequency::Daily => (6.0, 24.0),
            Frequency::Weekly => (48.0, 168.0),
            Frequency::Monthly => (72.0, 336.0),
            Frequency::Quarterly => (168.0, 720.0),
        }
    }

    pub fn period(&self) -> Duration {
        match self {
            Frequency::Daily => Duration::days(1),
            Frequency::Weekly => Duration::days(7),
            Frequency::Monthly => Duration::days(30),
            Frequency::Quarterly => Duration::days(90),
        }
    }
}

impl Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Frequency::Daily => "daily",
                Frequency::Weekly => "weekly",
                Frequency::Monthly => "monthly",
                Frequency::Quarterly => "quarterly",
            }
        )
    }
}

impl FromStr for Frequency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            "quarterly" => Ok(Frequency::Quarterly),
            _ => Err(anyhow::anyhow!("Invalid frequency: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FreshnessState {
    Fresh,
    Aging,
    Stale,
    Unknown,
}

impl Display for FreshnessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                FreshnessState::Fresh => "fresh",
                FreshnessState::Aging => "aging",
                FreshnessState::Stale => "stale",
                FreshnessState::Unknown => "unknown",
            }
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FreshnessStatus {
    pub metric_name: String,
    pub last_updated: Option<DateTime<Utc>>,
    pub expected_frequency: Frequency,
    pub state: FreshnessState,
    pub hours_stale: f64,
    pub next_expected_update: Option<DateTime<Utc>>,
    pub is_market_hours: Option<bool>,
}

/// True during 09:30–16:00 on a weekday, in the exchange timezone.
pub fn is_market_hours_at(now: DateTime<Utc>) -> bool {
    let local = now.with_timezone(&New_York);
    if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
        return false;
    }
    let open = NaiveTime::from_hms_opt(9, 30, 0);
    let close = NaiveTime::from_hms_opt(16, 0, 0);
    match (open, close) {
        (Some(open), Some(close)) => local.time() >= open && local.time() < close,
        _ => false,
    }
}

/// Classify how stale an indicator's last update is, relative to its
/// expected cadence, at an explicit point in time.
pub fn classify_at(
    metric_name: &str,
    last_updated: Option<DateTime<Utc>>,
    frequency: Frequency,
    market_dependent: bool,
    now: DateTime<Utc>,
) -> FreshnessStatus {
    let is_market_hours = market_dependent.then(|| is_market_hours_at(now));

    // A missing timestamp is unknown regardless of any other field.
    let Some(last) = last_updated else {
        return FreshnessStatus {
            metric_name: metric_name.to_string(),
            last_updated: None,
            expected_frequency: frequency,
            state: FreshnessState::Unknown,
            hours_stale: 0.0,
            next_expected_update: None,
            is_market_hours,
        };
    };

    let hours_stale = (now - last).num_milliseconds() as f64 / 3_600_000.0;
    let (fresh_limit, aging_limit) = frequency.thresholds_hours();

    let off_hours_daily_market = market_dependent
        && frequency == Frequency::Daily
        && is_market_hours == Some(false)
        && hours_stale < 24.0;

    let state = if off_hours_daily_market {
        FreshnessState::Fresh
    } else if hours_stale <= fresh_limit {
        FreshnessState::Fresh
    } else if hours_stale <= aging_limit {
        FreshnessState::Aging
    } else {
        FreshnessState::Stale
    };

    FreshnessStatus {
        metric_name: metric_name.to_string(),
        last_updated: Some(last),
        expected_frequency: frequency,
        state,
        hours_stale,
        next_expected_update: Some(next_expected_update(last, frequency, market_dependent)),
        is_market_hours,
    }
}

/// Advance one period, skip to the next weekday, and pin market-dependent
/// daily metrics to the 09:30 exchange open.
fn next_expected_update(
    last: DateTime<Utc>,
    frequency: Frequency,
    market_dependent: bool,
) -> DateTime<Utc> {
    let mut local = (last + frequency.period()).with_timezone(&New_York);

    while matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
        local += Duration::days(1);
    }

    if market_dependent && frequency == Frequency::Daily {
        if let Some(open) = local
            .with_hour(9)
            .and_then(|dt| dt.with_minute(30))
            .and_then(|dt| dt.with_second(0))
            .and_then(|dt| dt.with_nanosecond(0))
        {
            local = open;
        }
    }

    local.with_timezone(&Utc)
}
