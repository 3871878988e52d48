use crate::core::DataService;
use anyhow::Result;
use chrono::{NaiveDate, TimeZone, Utc};

/// Print the current value and freshness of every tracked indicator.
pub async fn run(service: &DataService) -> Result<()> {
    let names: Vec<String> = service.registry().iter().map(|s| s.name.clone()).collect();
    let values = service.get_bulk_indicator_values(&names).await;

    for spec in service.registry() {
        let Some(value) = values.get(&spec.name) else {
            continue;
        };

        let last_updated = NaiveDate::parse_from_str(&value.date, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .and_then(|dt| Utc.from_local_datetime(&dt).single());
        let freshness = service.compute_freshness(
            &spec.name,
            last_updated,
            spec.frequency,
            spec.market_dependent,
        );

        let change = value
            .change
            .map_or(String::new(), |c| format!(" ({c:+.2})"));
        println!(
            "{:<28} {:>10}{}  [{} | {} | {}]",
            spec.display_name, value.formatted, change, value.source, spec.frequency, freshness.state
        );
    }
    Ok(())
}
