use crate::core::DataService;
use crate::core::correlation::{Banding, Strength, filter_by_min_strength};
use anyhow::Result;
use chrono::{Duration, Utc};

const LOOKBACK_DAYS: i64 = 90;
const MAX_POINTS: u32 = 120;

/// Fetch recent history for every indicator and print the significant
/// correlation pairs, strongest first.
pub async fn run(service: &DataService, min_strength: Option<Strength>) -> Result<()> {
    let since = (Utc::now() - Duration::days(LOOKBACK_DAYS)).date_naive();
    let series = service.collect_series(Some(since), MAX_POINTS).await;

    if series.len() < 2 {
        println!("Not enough series with data to correlate.");
        return Ok(());
    }

    let matrix = service.compute_correlation_matrix(&series);
    let pairs = match min_strength {
        // The minimum-strength filter uses the coarser banding.
        Some(minimum) => {
            let reclassified = matrix
                .significant_pairs
                .into_iter()
                .map(|mut pair| {
                    pair.strength = Banding::Coarse.classify(pair.correlation);
                    pair
                })
                .collect();
            filter_by_min_strength(reclassified, minimum)
        }
        None => matrix.significant_pairs,
    };

    if pairs.is_empty() {
        println!("No significant pairs found.");
        return Ok(());
    }

    for pair in pairs {
        println!(
            "{:<20} ~ {:<20} r={:+.3}  n={:<4} {} {}",
            pair.metric_a, pair.metric_b, pair.correlation, pair.sample_size, pair.strength, pair.direction
        );
    }
    Ok(())
}
