//! Latency statistics and the nearest-rank percentile estimator.
//!
//! All statistics here are defined on empty input: they return zero instead
//! of NaN so a client with no successful writes still produces a report.

/// Nearest-rank percentile with round-half-up rank selection
///
/// Sorts a copy of `values` ascending and picks the element at
/// `floor(n * p / 100 + 0.5) - 1`. When that index falls outside the sample
/// (in particular for empty input, or very low percentiles on tiny samples)
/// the result is `0.0`. No interpolation is performed.
///
/// ```rust
/// # use influx_write_bench::metrics::percentile;
/// assert_eq!(percentile(&[5.0, 1.0, 3.0, 2.0, 4.0], 50.0), 3.0);
/// assert_eq!(percentile(&[10.0, 20.0], 25.0), 10.0);
/// assert_eq!(percentile(&[], 95.0), 0.0);
/// ```
pub fn percentile(values: &[f64], p: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = (sorted.len() as f64 * p / 100.0 + 0.5).floor() as i64;
    let index = rank - 1;

    if index < 0 || index >= sorted.len() as i64 {
        return 0.0;
    }
    sorted[index as usize]
}

/// Arithmetic mean, `0.0` for an empty sample
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (divides by `n - 1`), `0.0` below two samples
pub fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean(values);
    let variance =
        values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Smallest value, `0.0` for an empty sample
pub fn min(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().cloned().fold(f64::INFINITY, f64::min)
}

/// Largest value, `0.0` for an empty sample
pub fn max(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
}

/// Distribution summary of a set of latency samples (milliseconds)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LatencySummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub p25: f64,
    pub p50: f64,
    pub p95: f64,
}

impl LatencySummary {
    /// Summarize `samples`; an empty sample set yields all zeros
    pub fn from_samples(samples: &[f64]) -> Self {
        Self {
            min: min(samples),
            max: max(samples),
            mean: mean(samples),
            std_dev: sample_std_dev(samples),
            p25: percentile(samples, 25.0),
            p50: percentile(samples, 50.0),
            p95: percentile(samples, 95.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_fixtures() {
        assert_eq!(percentile(&[1.0, 2.0, 3.0, 4.0, 5.0], 50.0), 3.0);
        assert_eq!(percentile(&[10.0, 20.0], 25.0), 10.0);
        assert_eq!(percentile(&[], 95.0), 0.0);
    }

    #[test]
    fn test_percentile_unsorted_input() {
        let values = vec![9.0, 1.0, 7.0, 3.0, 5.0];
        assert_eq!(percentile(&values, 50.0), 5.0);
        assert_eq!(percentile(&values, 95.0), 9.0);
        // The caller's data is left untouched.
        assert_eq!(values, vec![9.0, 1.0, 7.0, 3.0, 5.0]);
    }

    #[test]
    fn test_percentile_rounds_half_up() {
        // n=4, p=25 -> floor(1.0 + 0.5) - 1 = 0
        assert_eq!(percentile(&[1.0, 2.0, 3.0, 4.0], 25.0), 1.0);
        // n=2, p=75 -> floor(1.5 + 0.5) - 1 = 1
        assert_eq!(percentile(&[1.0, 2.0], 75.0), 2.0);
        // n=10, p=95 -> floor(9.5 + 0.5) - 1 = 9
        let ten: Vec<f64> = (1..=10).map(f64::from).collect();
        assert_eq!(percentile(&ten, 95.0), 10.0);
        // Linear interpolation would give 5.5 here.
        assert_eq!(percentile(&ten, 50.0), 5.0);
    }

    #[test]
    fn test_percentile_out_of_range_is_zero() {
        // n=1, p=25 -> floor(0.25 + 0.5) - 1 = -1
        assert_eq!(percentile(&[42.0], 25.0), 0.0);
        assert_eq!(percentile(&[42.0], 50.0), 42.0);
        assert_eq!(percentile(&[1.0, 2.0], 0.0), 0.0);
    }

    #[test]
    fn test_sample_std_dev() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        // Sum of squared deviations is 32, n - 1 = 7.
        let expected = (32.0f64 / 7.0).sqrt();
        assert!((sample_std_dev(&values) - expected).abs() < 1e-12);

        assert_eq!(sample_std_dev(&[3.0]), 0.0);
        assert_eq!(sample_std_dev(&[]), 0.0);
    }

    #[test]
    fn test_summary_of_empty_samples_is_zero() {
        assert_eq!(LatencySummary::from_samples(&[]), LatencySummary::default());
    }

    #[test]
    fn test_summary() {
        let summary = LatencySummary::from_samples(&[4.0, 1.0, 3.0, 2.0]);

        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 4.0);
        assert_eq!(summary.mean, 2.5);
        assert_eq!(summary.p25, 1.0);
        assert_eq!(summary.p50, 2.0);
        assert_eq!(summary.p95, 4.0);
        assert!(summary.std_dev > 1.29 && summary.std_dev < 1.30);
    }
}
