use crate::core::DataService;
use crate::core::health::HealthSnapshot;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

/// Probe every provider and print the status board. With `watch`, keep a
/// periodic probe loop running and reprint on every cycle until
/// interrupted.
pub async fn run(service: &DataService, watch: bool, interval_minutes: u64) -> Result<()> {
    if !watch {
        let snapshot = service.health().run_probe_cycle().await;
        print_snapshot(&snapshot);
        return Ok(());
    }

    let id = service.health().subscribe(print_snapshot);
    let handle = Arc::clone(service.health()).spawn(Duration::from_secs(interval_minutes * 60));

    tokio::signal::ctrl_c().await?;

    handle.abort();
    service.health().unsubscribe(id);
    Ok(())
}

fn print_snapshot(snapshot: &HealthSnapshot) {
    println!("Overall: {}", snapshot.overall);
    for provider in &snapshot.providers {
        let latency = provider
            .latency_ms
            .map_or(String::new(), |ms| format!(" {ms:.0}ms"));
        println!(
            "  {:<16} {}{}  failures={}",
            provider.provider_name, provider.state, latency, provider.consecutive_failures
        );
    }
}
