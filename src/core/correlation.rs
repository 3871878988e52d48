//! Pairwise Pearson correlation over irregularly sampled time series.
//!
//! Two series "sampled daily" rarely print on identical timestamps, so
//! alignment pairs exact matches first and then nearest neighbours within
//! a 24-hour tolerance. Degenerate input never errors; it degrades to
//! `correlation = 0, sample_size = 0`.

use crate::core::indicator::MetricDataPoint;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

/// Nearest-match window for pairing points across two series.
pub const ALIGNMENT_TOLERANCE_MS: i64 = 24 * 60 * 60 * 1000;

/// Pairs below this count are not reported as a correlation.
pub const MIN_SAMPLE_SIZE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignedPair {
    pub timestamp_ms: i64,
    pub a: f64,
    pub b: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Strength {
    VeryWeak,
    Weak,
    Moderate,
    Strong,
    VeryStrong,
}

impl Display for Strength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Strength::VeryWeak => "very-weak",
                Strength::Weak => "weak",
                Strength::Moderate => "moderate",
                Strength::Strong => "strong",
                Strength::VeryStrong => "very-strong",
            }
        )
    }
}

impl FromStr for Strength {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "very-weak" => Ok(Strength::VeryWeak),
            "weak" => Ok(Strength::Weak),
            "moderate" => Ok(Strength::Moderate),
            "strong" => Ok(Strength::Strong),
            "very-strong" => Ok(Strength::VeryStrong),
            _ => Err(anyhow::anyhow!("Invalid strength label: {}", s)),
        }
    }
}

/// Two banding schemes are in use by different call sites; both are kept
/// as named policies rather than reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Banding {
    /// Thresholds at 0.3 / 0.5 / 0.7 / 0.9.
    Standard,
    /// Thresholds at 0.2 / 0.4 / 0.6 / 0.8, used by the minimum-strength filter.
    Coarse,
}

impl Banding {
    pub fn classify(&self, r: f64) -> Strength {
        let magnitude = r.abs();
        let (very_strong, strong, moderate, weak) = match self {
            Banding::Standard => (0.9, 0.7, 0.5, 0.3),
            Banding::Coarse => (0.8, 0.6, 0.4, 0.2),
        };
        if magnitude >= very_strong {
            Strength::VeryStrong
        } else if magnitude >= strong {
            Strength::Strong
        } else if magnitude >= moderate {
            Strength::Moderate
        } else if magnitude >= weak {
            Strength::Weak
        } else {
            Strength::VeryWeak
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Positive,
    Negative,
}

impl Direction {
    pub fn from_r(r: f64) -> Self {
        if r >= 0.0 {
            Direction::Positive
        } else {
            Direction::Negative
        }
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Positive => write!(f, "positive"),
            Direction::Negative => write!(f, "negative"),
        }
    }
}

/// Derived, stateless, recomputed on demand.
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationResult {
    pub metric_a: String,
    pub metric_b: String,
    pub correlation: f64,
    pub sample_size: usize,
    pub strength: Strength,
    pub direction: Direction,
}

#[derive(Debug, Clone, Serialize)]
pub struct CorrelationMatrix {
    pub metrics: Vec<String>,
    pub matrix: Vec<Vec<f64>>,
    pub significant_pairs: Vec<CorrelationResult>,
}

/// Sort ascending and drop duplicate timestamps, keeping the first
/// occurrence after the sort.
pub fn normalize_series(points: &[MetricDataPoint]) -> Vec<MetricDataPoint> {
    let mut sorted = points.to_vec();
    sorted.sort_by_key(|p| p.timestamp_ms);
    sorted.dedup_by_key(|p| p.timestamp_ms);
    sorted
}

/// Pair up two series: exact timestamp matches first, then the nearest
/// unused point within [`ALIGNMENT_TOLERANCE_MS`]. Unmatched points are
/// dropped. Each point on either side is used at most once, so the output
/// never exceeds `min(len(a), len(b))`.
pub fn align_series(a: &[MetricDataPoint], b: &[MetricDataPoint]) -> Vec<AlignedPair> {
    let a = normalize_series(a);
    let b = normalize_series(b);

    let index_by_ts: HashMap<i64, usize> =
        b.iter().enumerate().map(|(i, p)| (p.timestamp_ms, i)).collect();
    let mut used = vec![false; b.len()];
    let mut pairs = Vec::new();
    let mut unmatched = Vec::new();

    for pa in &a {
        match index_by_ts.get(&pa.timestamp_ms) {
            Some(&i) if !used[i] => {
                used[i] = true;
                pairs.push(AlignedPair {
                    timestamp_ms: pa.timestamp_ms,
                    a: pa.value,
                    b: b[i].value,
                });
            }
            _ => unmatched.push(pa),
        }
    }

    for pa in unmatched {
        let mut best: Option<(usize, i64)> = None;
        for (i, pb) in b.iter().enumerate() {
            if used[i] {
                continue;
            }
            let distance = (pb.timestamp_ms - pa.timestamp_ms).abs();
            if distance <= ALIGNMENT_TOLERANCE_MS && best.is_none_or(|(_, d)| distance < d) {
                best = Some((i, distance));
            }
        }
        if let Some((i, _)) = best {
            used[i] = true;
            pairs.push(AlignedPair {
                timestamp_ms: pa.timestamp_ms,
                a: pa.value,
                b: b[i].value,
            });
        }
    }

    pairs.sort_by_key(|p| p.timestamp_ms);
    pairs
}

/// Pearson correlation coefficient over aligned pairs. A flat series is
/// "uncorrelated" by convention: zero variance yields 0, never NaN.
pub fn pearson(pairs: &[AlignedPair]) -> f64 {
    let n = pairs.len() as f64;
    if pairs.is_empty() {
        return 0.0;
    }

    let mean_a = pairs.iter().map(|p| p.a).sum::<f64>() / n;
    let mean_b = pairs.iter().map(|p| p.b).sum::<f64>() / n;

    let mut covariance = 0.0;
    let mut variance_a = 0.0;
    let mut variance_b = 0.0;
    for p in pairs {
        let da = p.a - mean_a;
        let db = p.b - mean_b;
        covariance += da * db;
        variance_a += da * da;
        variance_b += db * db;
    }

    let denominator = (variance_a * variance_b).sqrt();
    if denominator == 0.0 {
        return 0.0;
    }
    (covariance / denominator).clamp(-1.0, 1.0)
}

/// Correlate two named series end to end: align, compute, classify.
pub fn correlate(
    metric_a: &str,
    metric_b: &str,
    a: &[MetricDataPoint],
    b: &[MetricDataPoint],
    banding: Banding,
) -> CorrelationResult {
    let aligned = align_series(a, b);
    let (correlation, sample_size) = if aligned.len() < MIN_SAMPLE_SIZE {
        (0.0, 0)
    } else {
        (pearson(&aligned), aligned.len())
    };

    CorrelationResult {
        metric_a: metric_a.to_string(),
        metric_b: metric_b.to_string(),
        correlation,
        sample_size,
        strength: banding.classify(correlation),
        direction: Direction::from_r(correlation),
    }
}

/// Full N×N correlation matrix plus the deduplicated list of unique
/// unordered pairs with enough aligned samples, sorted by |r| descending.
pub fn build_matrix(series: &HashMap<String, Vec<MetricDataPoint>>) -> CorrelationMatrix {
    let mut metrics: Vec<String> = series.keys().cloned().collect();
    metrics.sort();

    let n = metrics.len();
    let mut matrix = vec![vec![0.0; n]; n];
    let mut significant_pairs = Vec::new();

    for i in 0..n {
        matrix[i][i] = 1.0;
        for j in (i + 1)..n {
            let result = correlate(
                &metrics[i],
                &metrics[j],
                &series[&metrics[i]],
                &series[&metrics[j]],
                Banding::Standard,
            );
            matrix[i][j] = result.correlation;
            matrix[j][i] = result.correlation;
            if result.sample_size >= MIN_SAMPLE_SIZE {
                significant_pairs.push(result);
            }
        }
    }

    significant_pairs.sort_by(|x, y| {
        y.correlation
            .abs()
            .partial_cmp(&x.correlation.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    CorrelationMatrix {
        metrics,
        matrix,
        significant_pairs,
    }
}

/// Keep only pairs whose strength is at least `minimum` on the ordered
/// scale very-weak < weak < moderate < strong < very-strong.
pub fn filter_by_min_strength(
    results: Vec<CorrelationResult>,
    minimum: Strength,
) -> Vec<CorrelationResult> {
    results.into_iter().filter(|r| r.strength >= minimum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY_MS: i64 = 24 * 60 * 60 * 1000;

    fn series(values: &[f64]) -> Vec<MetricDataPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| MetricDataPoint {
                timestamp_ms: i as i64 * DAY_MS,
                value: v,
            })
            .collect()
    }

    #[test]
    fn test_self_correlation_is_one() {
        let a = series(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let result = correlate("a", "a", &a, &a, Banding::Standard);
        assert!((result.correlation - 1.0).abs() < 1e-12);
        assert_eq!(result.sample_size, 5);
        assert_eq!(result.strength, Strength::VeryStrong);
    }

    #[test]
    fn test_correlation_is_symmetric() {
        let a = series(&[1.0, 3.0, 2.0, 5.0, 4.0]);
        let b = series(&[2.0, 1.0, 4.0, 3.0, 6.0]);
        let ab = correlate("a", "b", &a, &b, Banding::Standard);
        let ba = correlate("b", "a", &b, &a, Banding::Standard);
        assert!((ab.correlation - ba.correlation).abs() < 1e-12);
    }

    #[test]
    fn test_constant_series_yields_zero_not_nan() {
        let flat = series(&[7.0, 7.0, 7.0, 7.0]);
        let moving = series(&[1.0, 2.0, 3.0, 4.0]);
        let result = correlate("flat", "moving", &flat, &moving, Banding::Standard);
        assert_eq!(result.correlation, 0.0);
        assert!(!result.correlation.is_nan());
        assert_eq!(result.direction, Direction::Positive);
    }

    #[test]
    fn test_known_coefficient_and_both_bandings() {
        // Hand-computed: cov = 8, var_a = var_b = 10, r = 0.8.
        let a = series(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let b = series(&[2.0, 1.0, 4.0, 3.0, 5.0]);
        let aligned = align_series(&a, &b);
        let r = pearson(&aligned);
        assert!((r - 0.8).abs() < 1e-12);
        assert_eq!(Banding::Standard.classify(r), Strength::Strong);
        assert_eq!(Banding::Coarse.classify(r), Strength::VeryStrong);
    }

    #[test]
    fn test_negative_direction() {
        let a = series(&[1.0, 2.0, 3.0, 4.0]);
        let b = series(&[4.0, 3.0, 2.0, 1.0]);
        let result = correlate("a", "b", &a, &b, Banding::Standard);
        assert!((result.correlation + 1.0).abs() < 1e-12);
        assert_eq!(result.direction, Direction::Negative);
    }

    #[test]
    fn test_insufficient_samples_degrade_to_zero() {
        let a = series(&[1.0, 2.0]);
        let b = series(&[2.0, 4.0]);
        let result = correlate("a", "b", &a, &b, Banding::Standard);
        assert_eq!(result.correlation, 0.0);
        assert_eq!(result.sample_size, 0);
    }

    #[test]
    fn test_alignment_within_tolerance() {
        let a = vec![
            MetricDataPoint { timestamp_ms: 0, value: 1.0 },
            MetricDataPoint { timestamp_ms: DAY_MS, value: 2.0 },
            MetricDataPoint { timestamp_ms: 2 * DAY_MS, value: 3.0 },
        ];
        // Offset by 6 hours: no exact matches, all within tolerance.
        let offset = 6 * 60 * 60 * 1000;
        let b: Vec<_> = a
            .iter()
            .map(|p| MetricDataPoint {
                timestamp_ms: p.timestamp_ms + offset,
                value: p.value * 2.0,
            })
            .collect();

        let aligned = align_series(&a, &b);
        assert_eq!(aligned.len(), 3);
        assert!(aligned.windows(2).all(|w| w[0].timestamp_ms < w[1].timestamp_ms));
    }

    #[test]
    fn test_alignment_drops_points_beyond_tolerance() {
        let a = vec![MetricDataPoint { timestamp_ms: 0, value: 1.0 }];
        let b = vec![MetricDataPoint {
            timestamp_ms: ALIGNMENT_TOLERANCE_MS + 1,
            value: 2.0,
        }];
        assert!(align_series(&a, &b).is_empty());
    }

    #[test]
    fn test_alignment_never_exceeds_shorter_series() {
        // Five points in a, two in b, all mutually within tolerance.
        let a: Vec<_> = (0..5)
            .map(|i| MetricDataPoint {
                timestamp_ms: i * 60 * 60 * 1000,
                value: i as f64,
            })
            .collect();
        let b = vec![
            MetricDataPoint { timestamp_ms: 0, value: 10.0 },
            MetricDataPoint { timestamp_ms: 60 * 60 * 1000, value: 20.0 },
        ];
        let aligned = align_series(&a, &b);
        assert!(aligned.len() <= b.len());
    }

    #[test]
    fn test_normalize_dedups_by_timestamp_keeping_first() {
        let points = vec![
            MetricDataPoint { timestamp_ms: DAY_MS, value: 2.0 },
            MetricDataPoint { timestamp_ms: 0, value: 1.0 },
            MetricDataPoint { timestamp_ms: DAY_MS, value: 99.0 },
        ];
        let normalized = normalize_series(&points);
        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized[0].value, 1.0);
        assert_eq!(normalized[1].value, 2.0);
    }

    #[test]
    fn test_matrix_diagonal_and_symmetry() {
        let mut input = HashMap::new();
        input.insert("a".to_string(), series(&[1.0, 2.0, 3.0, 4.0, 5.0]));
        input.insert("b".to_string(), series(&[2.0, 1.0, 4.0, 3.0, 5.0]));
        input.insert("c".to_string(), series(&[5.0, 4.0, 3.0, 2.0, 1.0]));

        let result = build_matrix(&input);
        assert_eq!(result.metrics.len(), 3);
        for i in 0..3 {
            assert_eq!(result.matrix[i][i], 1.0);
            for j in 0..3 {
                assert_eq!(result.matrix[i][j], result.matrix[j][i]);
            }
        }
        // Three unique unordered pairs, sorted by |r| descending.
        assert_eq!(result.significant_pairs.len(), 3);
        let magnitudes: Vec<f64> = result
            .significant_pairs
            .iter()
            .map(|p| p.correlation.abs())
            .collect();
        assert!(magnitudes.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_matrix_excludes_pairs_with_too_few_samples() {
        let mut input = HashMap::new();
        input.insert("a".to_string(), series(&[1.0, 2.0, 3.0, 4.0]));
        input.insert("b".to_string(), series(&[1.0, 2.0]));

        let result = build_matrix(&input);
        assert!(result.significant_pairs.is_empty());
    }

    #[test]
    fn test_filter_by_min_strength() {
        let make = |name: &str, r: f64| CorrelationResult {
            metric_a: name.to_string(),
            metric_b: "x".to_string(),
            correlation: r,
            sample_size: 10,
            strength: Banding::Standard.classify(r),
            direction: Direction::from_r(r),
        };
        let results = vec![make("a", 0.95), make("b", -0.6), make("c", 0.2)];
        let filtered = filter_by_min_strength(results, Strength::Moderate);
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|r| r.strength >= Strength::Moderate));
    }
}
