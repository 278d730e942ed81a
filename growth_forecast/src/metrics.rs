//! Metrics for evaluating how well a fitted model reproduces its data

use crate::error::{ForecastError, Result};
use serde::Serialize;
use statrs::statistics::Statistics;

/// Forecast accuracy metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastAccuracy {
    /// Mean Absolute Error
    pub mae: f64,
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Percentage Error
    pub mape: f64,
}

/// Calculate accuracy metrics for fitted vs actual values
pub fn forecast_accuracy(fitted: &[f64], actual: &[f64]) -> Result<ForecastAccuracy> {
    if fitted.len() != actual.len() || fitted.is_empty() {
        return Err(ForecastError::ValidationError(
            "Fitted and actual values must have the same non-zero length".to_string(),
        ));
    }

    let errors: Vec<f64> = fitted
        .iter()
        .zip(actual.iter())
        .map(|(&f, &a)| a - f)
        .collect();

    let mae = errors.iter().map(|e| e.abs()).mean();
    let mse = errors.iter().map(|e| e.powi(2)).mean();

    let mape = actual
        .iter()
        .zip(errors.iter())
        .filter(|(a, _)| **a != 0.0)
        .map(|(a, e)| (e.abs() / a.abs()) * 100.0)
        .sum::<f64>()
        / errors.len() as f64;

    Ok(ForecastAccuracy {
        mae,
        mse,
        rmse: mse.sqrt(),
        mape,
    })
}

/// Coefficient of determination against the mean of `actual`, clamped to `[0, 1]`.
///
/// Pairs where either side is non-finite are ignored. A constant (or
/// empty) `actual` yields `0.0`.
pub fn r_squared(fitted: &[f64], actual: &[f64]) -> f64 {
    let pairs: Vec<(f64, f64)> = fitted
        .iter()
        .zip(actual.iter())
        .filter(|(f, a)| f.is_finite() && a.is_finite())
        .map(|(&f, &a)| (f, a))
        .collect();
    if pairs.is_empty() {
        return 0.0;
    }

    let mean = pairs.iter().map(|(_, a)| *a).mean();
    let ss_total: f64 = pairs.iter().map(|(_, a)| (a - mean).powi(2)).sum();
    let ss_residual: f64 = pairs.iter().map(|(f, a)| (a - f).powi(2)).sum();

    if ss_total < growth_math::regression::DEGENERACY_TOLERANCE {
        return 0.0;
    }
    (1.0 - ss_residual / ss_total).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_forecast_accuracy() {
        let actual = [10.0, 20.0, 30.0, 40.0, 50.0];
        let fitted = [12.0, 18.0, 33.0, 37.0, 52.0];

        let accuracy = forecast_accuracy(&fitted, &actual).unwrap();
        assert_relative_eq!(accuracy.mae, 2.4, epsilon = 1e-9);
        assert_relative_eq!(accuracy.mse, 6.0, epsilon = 1e-9);
        assert_relative_eq!(accuracy.rmse, 6.0_f64.sqrt(), epsilon = 1e-9);
        assert!(accuracy.mape > 0.0);
    }

    #[test]
    fn test_forecast_accuracy_rejects_mismatch() {
        assert!(forecast_accuracy(&[1.0], &[1.0, 2.0]).is_err());
        assert!(forecast_accuracy(&[], &[]).is_err());
    }

    #[test]
    fn test_r_squared_bounds() {
        assert_eq!(r_squared(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]), 1.0);
        assert_eq!(r_squared(&[5.0, 5.0, 5.0], &[5.0, 5.0, 5.0]), 0.0);
        assert_eq!(r_squared(&[9.0, -9.0, 9.0], &[1.0, 2.0, 3.0]), 0.0);
    }
}
