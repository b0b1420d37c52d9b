//! Pure, stateless numeric helpers for trend and anomaly detection.
//!
//! Ordinary-least-squares trend fitting and z-score anomaly detection over a
//! time-ordered series. No I/O; every function is directly unit-testable.

use crate::models::Confidence;

/// Ordinary-least-squares slope of `(x, y)` pairs. Needs at least two points;
/// returns `0.0` for a degenerate (constant-x) input rather than dividing by
/// zero.
pub fn linear_trend_slope(points: &[(f64, f64)]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let n = points.len() as f64;
    let sum_x: f64 = points.iter().map(|(x, _)| x).sum();
    let sum_y: f64 = points.iter().map(|(_, y)| y).sum();
    let mean_x = sum_x / n;
    let mean_y = sum_y / n;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (x, y) in points {
        numerator += (x - mean_x) * (y - mean_y);
        denominator += (x - mean_x).powi(2);
    }

    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Time (in x-units) until `current` reaches `threshold` at `slope`.
/// `None` represents infinity: the slope is non-positive and the value will
/// never reach the threshold by extrapolation.
pub fn time_to_threshold(current: f64, threshold: f64, slope: f64) -> Option<f64> {
    if slope > 0.0 {
        Some((threshold - current) / slope)
    } else {
        None
    }
}

/// Indices of `values` whose population z-score exceeds `threshold` in
/// magnitude. Needs at least three points and a non-zero standard deviation;
/// returns an empty vector otherwise rather than raising.
pub fn zscore_anomalies(values: &[f64], threshold: f64) -> Vec<usize> {
    if values.len() < 3 {
        return Vec::new();
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let stdev = variance.sqrt();
    if stdev == 0.0 {
        return Vec::new();
    }
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| ((*v - mean) / stdev).abs() > threshold)
        .map(|(i, _)| i)
        .collect()
}

pub const DEFAULT_ZSCORE_THRESHOLD: f64 = 3.0;

/// `|history| >= 20 -> high, >= 10 -> medium, else low`. Thin re-export of
/// [`Confidence::from_sample_size`] kept here so callers reading the
/// predictive module don't need to know the label lives on the enum.
pub fn confidence_for_sample_size(n: usize) -> Confidence {
    Confidence::from_sample_size(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slope_of_perfect_line_is_exact() {
        let points: Vec<(f64, f64)> = (0..10).map(|i| (i as f64, 2.0 * i as f64 + 1.0)).collect();
        assert!((linear_trend_slope(&points) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn slope_of_constant_x_is_zero() {
        let points = vec![(5.0, 1.0), (5.0, 2.0), (5.0, 3.0)];
        assert_eq!(linear_trend_slope(&points), 0.0);
    }

    #[test]
    fn slope_needs_at_least_two_points() {
        assert_eq!(linear_trend_slope(&[(1.0, 1.0)]), 0.0);
        assert_eq!(linear_trend_slope(&[]), 0.0);
    }

    #[test]
    fn time_to_threshold_is_none_for_non_positive_slope() {
        assert_eq!(time_to_threshold(50.0, 100.0, 0.0), None);
        assert_eq!(time_to_threshold(50.0, 100.0, -1.0), None);
    }

    #[test]
    fn time_to_threshold_computes_linear_extrapolation() {
        assert_eq!(time_to_threshold(50.0, 100.0, 5.0), Some(10.0));
    }

    #[test]
    fn zscore_finds_the_outlier() {
        let values = vec![10.0, 11.0, 9.0, 10.0, 11.0, 9.0, 50.0];
        let anomalies = zscore_anomalies(&values, DEFAULT_ZSCORE_THRESHOLD);
        assert_eq!(anomalies, vec![6]);
    }

    #[test]
    fn zscore_needs_at_least_three_points() {
        assert!(zscore_anomalies(&[1.0, 2.0], DEFAULT_ZSCORE_THRESHOLD).is_empty());
    }

    #[test]
    fn zscore_returns_empty_for_constant_series() {
        assert!(zscore_anomalies(&[5.0, 5.0, 5.0, 5.0], DEFAULT_ZSCORE_THRESHOLD).is_empty());
    }

    #[test]
    fn confidence_labels_match_calibration() {
        assert_eq!(confidence_for_sample_size(25), Confidence::High);
        assert_eq!(confidence_for_sample_size(15), Confidence::Medium);
        assert_eq!(confidence_for_sample_size(5), Confidence::Low);
    }
}
