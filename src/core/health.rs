//! Live operational view of each upstream provider.
//!
//! A single periodic timer drives the probe cycle; every other component
//! feeds the same status model through [`HealthAggregator::record_observation`].

use crate::core::error::ProviderError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Display;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HealthState {
    Healthy,
    Degraded,
    Down,
    Unknown,
}

impl Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                HealthState::Healthy => "healthy",
                HealthState::Degraded => "degraded",
                HealthState::Down => "down",
                HealthState::Unknown => "unknown",
            }
        )
    }
}

/// Per-provider status record, mutated in place on each probe cycle and
/// read-only to every other component.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
    pub provider_name: String,
    pub state: HealthState,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub latency_ms: Option<f64>,
    pub consecutive_failures: u32,
}

impl ProviderHealth {
    fn unknown(name: &str) -> Self {
        Self {
            provider_name: name.to_string(),
            state: HealthState::Unknown,
            last_checked_at: None,
            last_success_at: None,
            latency_ms: None,
            consecutive_failures: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub overall: HealthState,
    pub providers: Vec<ProviderHealth>,
    pub checked_at: DateTime<Utc>,
}

/// A minimal, low-cost check a provider can answer. `Ok(Healthy)` means a
/// well-formed expected payload; `Ok(Degraded)` means rate-limited or
/// malformed but parseable; `Err` means down.
#[async_trait]
pub trait ProviderProbe: Send + Sync {
    fn name(&self) -> &str;
    async fn probe(&self) -> Result<HealthState, ProviderError>;
}

type Listener = Box<dyn Fn(&HealthSnapshot) + Send + Sync>;

pub struct HealthAggregator {
    probes: Vec<Arc<dyn ProviderProbe>>,
    statuses: Mutex<HashMap<String, ProviderHealth>>,
    listeners: StdMutex<Vec<(u64, Listener)>>,
    next_listener_id: AtomicU64,
}

impl HealthAggregator {
    pub fn new(probes: Vec<Arc<dyn ProviderProbe>>) -> Self {
        let statuses = probes
            .iter()
            .map(|p| (p.name().to_string(), ProviderHealth::unknown(p.name())))
            .collect();
        Self {
            probes,
            statuses: Mutex::new(statuses),
            listeners: StdMutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
        }
    }

    /// Probe every provider once and notify subscribers. Also serves as
    /// the on-demand trigger outside the scheduled cycle.
    pub async fn run_probe_cycle(&self) -> HealthSnapshot {
        for probe in &self.probes {
            let started = Instant::now();
            let outcome = probe.probe().await;
            let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

            let state = match outcome {
                Ok(state) => state,
                Err(e) => {
                    warn!(provider = probe.name(), error = %e, "Health probe failed");
                    HealthState::Down
                }
            };
            debug!(provider = probe.name(), %state, latency_ms, "Probe completed");
            self.apply(probe.name(), state, Some(latency_ms)).await;
        }

        let snapshot = self.snapshot().await;
        self.notify(&snapshot);
        snapshot
    }

    /// Inline feedback from a live-fetch call site, outside the probe cycle.
    pub async fn record_observation(&self, provider: &str, success: bool, latency_ms: Option<f64>) {
        let state = if success {
            HealthState::Healthy
        } else {
            HealthState::Down
        };
        self.apply(provider, state, latency_ms).await;
    }

    async fn apply(&self, provider: &str, state: HealthState, latency_ms: Option<f64>) {
        let mut statuses = self.statuses.lock().await;
        let status = statuses
            .entry(provider.to_string())
            .or_insert_with(|| ProviderHealth::unknown(provider));

        let now = Utc::now();
        status.state = state;
        status.last_checked_at = Some(now);
        status.latency_ms = latency_ms;
        if state == HealthState::Healthy {
            status.last_success_at = Some(now);
            status.consecutive_failures = 0;
        } else {
            status.consecutive_failures += 1;
        }
    }

    pub async fn snapshot(&self) -> HealthSnapshot {
        let statuses = self.statuses.lock().await;
        let mut providers: Vec<ProviderHealth> = statuses.values().cloned().collect();
        providers.sort_by(|a, b| a.provider_name.cmp(&b.provider_name));

        HealthSnapshot {
            overall: Self::overall(&providers),
            providers,
            checked_at: Utc::now(),
        }
    }

    fn overall(providers: &[ProviderHealth]) -> HealthState {
        if providers.is_empty() {
            return HealthState::Unknown;
        }
        if providers.iter().all(|p| p.state == HealthState::Healthy) {
            HealthState::Healthy
        } else if providers.iter().all(|p| p.state == HealthState::Down) {
            HealthState::Down
        } else {
            HealthState::Degraded
        }
    }

    /// Register a listener invoked synchronously after each probe cycle.
    /// Returns an id usable with [`Self::unsubscribe`].
    pub fn subscribe<F>(&self, listener: F) -> u64
    where
        F: Fn(&HealthSnapshot) + Send + Sync + 'static,
    {
        let id = self.next_listener_id.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push((id, Box::new(listener)));
        }
        id
    }

    pub fn unsubscribe(&self, id: u64) -> bool {
        match self.listeners.lock() {
            Ok(mut listeners) => {
                let before = listeners.len();
                listeners.retain(|(lid, _)| *lid != id);
                listeners.len() != before
            }
            Err(_) => false,
        }
    }

    fn notify(&self, snapshot: &HealthSnapshot) {
        let Ok(listeners) = self.listeners.lock() else {
            return;
        };
        for (id, listener) in listeners.iter() {
            // A panicking listener must not prevent the others from running.
            if catch_unwind(AssertUnwindSafe(|| listener(snapshot))).is_err() {
                warn!(listener = id, "Health listener panicked");
            }
        }
    }

    /// Drive the recurring probe cycle on its own task.
    pub fn spawn(self: Arc<Self>, interval: std::time::Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.run_probe_cycle().await;
            }
        })
    }
}
