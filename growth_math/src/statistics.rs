//! Summary statistics and series transforms
//!
//! Contains:
//! - Mean and population variance
//! - Autocorrelation at a given lag
//! - Regular and seasonal differencing

use statrs::statistics::Statistics;

/// Arithmetic mean; `NaN` for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    values.iter().mean()
}

/// Population variance (divides by `n`); `NaN` for an empty slice
pub fn population_variance(values: &[f64]) -> f64 {
    values.iter().population_variance()
}

/// Sample autocorrelation at `lag`.
///
/// Uses the overall mean and the full-series sum of squares as the
/// denominator, so the result lies within `[-1, 1]`. Returns `0.0` when the
/// lag does not fit inside the series or the series has no variance.
pub fn autocorrelation(values: &[f64], lag: usize) -> f64 {
    let n = values.len();
    if lag == 0 || lag >= n {
        return 0.0;
    }

    let m = mean(values);
    let denominator: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    if denominator <= f64::EPSILON {
        return 0.0;
    }

    let numerator: f64 = values
        .iter()
        .zip(values.iter().skip(lag))
        .map(|(a, b)| (a - m) * (b - m))
        .sum();

    numerator / denominator
}

/// First-order regular difference `x[t] - x[t-1]`
pub fn difference(values: &[f64]) -> Vec<f64> {
    seasonal_difference(values, 1)
}

/// Seasonal difference `x[t] - x[t-lag]`; empty when `lag` is zero or too long
pub fn seasonal_difference(values: &[f64], lag: usize) -> Vec<f64> {
    if lag == 0 || values.len() <= lag {
        return Vec::new();
    }
    values
        .iter()
        .skip(lag)
        .zip(values.iter())
        .map(|(current, previous)| current - previous)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_and_variance() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(mean(&values), 5.0);
        assert_relative_eq!(population_variance(&values), 4.0);
        assert!(mean(&[]).is_nan());
    }

    #[test]
    fn test_autocorrelation_of_repeating_pattern() {
        let week = [12.0, 12.0, 12.0, 12.0, 10.0, 10.0, 10.0];
        let series: Vec<f64> = week.iter().chain(week.iter()).copied().collect();

        let acf = autocorrelation(&series, 7);
        assert_relative_eq!(acf, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_autocorrelation_edge_cases() {
        assert_eq!(autocorrelation(&[1.0, 1.0, 1.0, 1.0], 1), 0.0);
        assert_eq!(autocorrelation(&[1.0, 2.0, 3.0], 3), 0.0);
        assert_eq!(autocorrelation(&[1.0, 2.0, 3.0], 0), 0.0);
    }

    #[test]
    fn test_differencing() {
        let values = [1.0, 3.0, 6.0, 10.0];
        assert_eq!(difference(&values), vec![2.0, 3.0, 4.0]);
        assert_eq!(seasonal_difference(&values, 2), vec![5.0, 7.0]);
        assert!(seasonal_difference(&values, 4).is_empty());
    }
}
