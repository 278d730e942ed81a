//! Simplified seasonal ARIMA-style forecaster
//!
//! Differencing and seasonal-strength checks feed the diagnostics only; the
//! forecast itself is built from the original series as a damped sum of
//! trend, seasonal, autoregressive and moving-average components, then held
//! inside a slowly widening band around the last observation.
//!
//! The damping and band constants are empirically tuned values kept for
//! behavioural compatibility. They are not known to be optimal and should
//! be recalibrated if the engine is retrained on new domains.

use crate::data::TimeSeries;
use crate::error::{ForecastError, Result};
use crate::models::{
    check_horizon, ForecastDiagnostics, ForecastModel, ForecastResult, ModelKind,
    SeasonalDiagnostics,
};
use growth_math::moving_averages::{moving_average, trailing_mean};
use growth_math::statistics::{
    autocorrelation, difference, mean, population_variance, seasonal_difference,
};
use growth_math::LinearRegression;
use tracing::debug;

/// Fewest points the forecaster will ever accept
pub const ABSOLUTE_MIN_POINTS: usize = 10;
/// Default minimum for production use
pub const DEFAULT_MIN_POINTS: usize = 14;
pub const DEFAULT_PERIOD: usize = 7;
/// Seasonal strength below which the series counts as stationary
pub const STATIONARITY_THRESHOLD: f64 = 0.3;
/// Damping factor is `e^(-step / DAMPING_SCALE)`
pub const DAMPING_SCALE: f64 = 200.0;
/// Upper bound on the trend moving-average window
pub const TREND_WINDOW: usize = 7;
/// Trailing points used for the trend slope
pub const SLOPE_WINDOW: usize = 10;
/// Autoregressive order
pub const AR_ORDER: usize = 1;
/// AR lag weight is `AR_WEIGHT · e^(-AR_DECAY · lag)`
pub const AR_WEIGHT: f64 = 0.1;
pub const AR_DECAY: f64 = 0.1;
pub const AR_SCALE: f64 = 0.1;
pub const MA_SCALE: f64 = 0.05;
/// Lower band is `last · max(LOWER_BAND_FLOOR, 1 - LOWER_BAND_RATE · step)`
pub const LOWER_BAND_FLOOR: f64 = 0.8;
pub const LOWER_BAND_RATE: f64 = 0.0005;
/// Upper band is `last · min(UPPER_BAND_CAP, 1 + UPPER_BAND_RATE · step)`
pub const UPPER_BAND_CAP: f64 = 2.5;
pub const UPPER_BAND_RATE: f64 = 0.001;
pub const MIN_CONFIDENCE: f64 = 0.5;
pub const MAX_CONFIDENCE: f64 = 0.95;

/// Permitted range for the prediction `step` days ahead of `last_value`
pub fn forecast_band(last_value: f64, step: usize) -> (f64, f64) {
    let step = step as f64;
    let lower = last_value * LOWER_BAND_FLOOR.max(1.0 - LOWER_BAND_RATE * step);
    let upper = last_value * UPPER_BAND_CAP.min(1.0 + UPPER_BAND_RATE * step);
    (lower, upper)
}

/// `clamp(1 − variance / (last² + 1), 0.5, 0.95)`
pub fn forecast_confidence(values: &[f64]) -> f64 {
    let Some(&last) = values.last() else {
        return MIN_CONFIDENCE;
    };
    let confidence = 1.0 - population_variance(values) / (last * last + 1.0);
    if confidence.is_finite() {
        confidence.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
    } else {
        MIN_CONFIDENCE
    }
}

/// Components estimated once per series
#[derive(Debug, Clone)]
struct Decomposition {
    last_trend: f64,
    slope: f64,
    /// Mean deviation from the overall mean, per phase
    seasonal: Vec<f64>,
    recent_mean: f64,
}

/// Seasonal forecaster over a single series; holds no state between calls
#[derive(Debug, Clone)]
pub struct SeasonalForecaster {
    /// Name of the model
    name: String,
    period: usize,
    min_points: usize,
}

impl Default for SeasonalForecaster {
    fn default() -> Self {
        Self {
            name: format!("Seasonal (period={})", DEFAULT_PERIOD),
            period: DEFAULT_PERIOD,
            min_points: DEFAULT_MIN_POINTS,
        }
    }
}

impl SeasonalForecaster {
    /// Create a forecaster.
    ///
    /// # Errors
    ///
    /// The period must be at least 2 and the minimum point count at least
    /// [`ABSOLUTE_MIN_POINTS`].
    pub fn new(period: usize, min_points: usize) -> Result<Self> {
        if period < 2 {
            return Err(ForecastError::InvalidParameter(
                "Seasonal period must be at least 2".to_string(),
            ));
        }
        if min_points < ABSOLUTE_MIN_POINTS {
            return Err(ForecastError::InvalidParameter(format!(
                "Seasonal forecasting needs at least {} points, {} requested",
                ABSOLUTE_MIN_POINTS, min_points
            )));
        }

        Ok(Self {
            name: format!("Seasonal (period={})", period),
            period,
            min_points,
        })
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Seasonal strength, stationarity and the differencing they imply
    pub fn diagnose(&self, values: &[f64]) -> SeasonalDiagnostics {
        let seasonal_strength = autocorrelation(values, self.period).abs().min(1.0);
        let is_stationary = seasonal_strength < STATIONARITY_THRESHOLD;

        let mut transformed = values.to_vec();
        let mut differencing_order = 0;
        if !is_stationary {
            transformed = difference(&transformed);
            differencing_order = 1;
        }
        let mut seasonal_differencing = false;
        if seasonal_strength > STATIONARITY_THRESHOLD && transformed.len() > self.period {
            transformed = seasonal_difference(&transformed, self.period);
            seasonal_differencing = true;
        }

        debug!(
            seasonal_strength,
            is_stationary,
            differencing_order,
            seasonal_differencing,
            transformed_len = transformed.len(),
            "seasonal diagnostics"
        );

        SeasonalDiagnostics {
            seasonal_period: self.period,
            seasonal_strength,
            is_stationary,
            differencing_order,
            seasonal_differencing,
        }
    }

    fn decompose(&self, series: &TimeSeries) -> Result<Decomposition> {
        let values = series.values();
        let n = values.len();

        let trend_window = TREND_WINDOW.min(n / 3).max(1);
        let trend = moving_average(&values, trend_window)?;
        let last_trend = trend.last().copied().unwrap_or(values[n - 1]);

        let slope_start = n - SLOPE_WINDOW.min(n);
        let days = series.day_indices();
        let slope = LinearRegression::fit(&days[slope_start..], &values[slope_start..])
            .map(|line| line.slope())
            .unwrap_or(0.0);

        let overall_mean = mean(&values);
        let mut sums = vec![0.0; self.period];
        let mut counts = vec![0usize; self.period];
        for (position, value) in values.iter().enumerate() {
            sums[position % self.period] += value - overall_mean;
            counts[position % self.period] += 1;
        }
        let seasonal = sums
            .iter()
            .zip(&counts)
            .map(|(sum, &count)| if count > 0 { sum / count as f64 } else { 0.0 })
            .collect();

        let recent_mean = trailing_mean(&values, self.period).unwrap_or(values[n - 1]);

        Ok(Decomposition {
            last_trend,
            slope,
            seasonal,
            recent_mean,
        })
    }

    /// Daily predictions for `horizon` steps past the end of the series
    pub fn forecast_values(
        &self,
        series: &TimeSeries,
        horizon: usize,
        seasonal_strength: f64,
    ) -> Result<Vec<f64>> {
        check_horizon(horizon)?;
        series.require(self.min_points)?;

        let values = series.values();
        let n = values.len();
        let last_value = values[n - 1];
        let parts = self.decompose(series)?;

        let autoregressive: f64 = (1..=AR_ORDER.min(n))
            .map(|lag| AR_WEIGHT * (-AR_DECAY * lag as f64).exp() * values[n - lag])
            .sum();

        let predictions = (1..=horizon)
            .map(|step| {
                let damping = (-(step as f64) / DAMPING_SCALE).exp();
                let trend = parts.last_trend + parts.slope * step as f64 * damping;
                let phase = (n + step - 1) % self.period;
                let seasonal = parts.seasonal[phase] * seasonal_strength;
                let ar = autoregressive * AR_SCALE * damping;
                let ma = (parts.recent_mean - last_value) * MA_SCALE * damping;

                let components = [trend, seasonal, ar, ma];
                let raw = if components.iter().all(|c| c.is_finite()) {
                    components.iter().sum::<f64>()
                } else {
                    last_value
                };
                let raw = if raw.is_finite() { raw } else { last_value };

                let (lower, upper) = forecast_band(last_value, step);
                raw.clamp(lower, upper)
            })
            .collect();

        Ok(predictions)
    }
}

impl ForecastModel for SeasonalForecaster {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ModelKind {
        ModelKind::Seasonal
    }

    fn forecast(&self, series: &TimeSeries, horizon: usize) -> Result<ForecastResult> {
        check_horizon(horizon)?;
        series.require(self.min_points)?;

        let values = series.values();
        let seasonal = self.diagnose(&values);
        let daily_predictions =
            self.forecast_values(series, horizon, seasonal.seasonal_strength)?;

        let mut diagnostics = ForecastDiagnostics::new(series.len());
        diagnostics.seasonal = Some(seasonal);

        ForecastResult::new(
            ModelKind::Seasonal,
            values[values.len() - 1],
            daily_predictions,
            forecast_confidence(&values),
            diagnostics,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_constructor_enforces_minimums() {
        assert!(SeasonalForecaster::new(1, 14).is_err());
        assert!(SeasonalForecaster::new(7, 9).is_err());
        assert!(SeasonalForecaster::new(7, 10).is_ok());
    }

    #[rstest]
    #[case(1, 0.9995, 1.001)]
    #[case(100, 0.95, 1.1)]
    #[case(1_000, 0.8, 2.0)]
    #[case(5_000, 0.8, 2.5)]
    fn test_band_widens_then_caps(#[case] step: usize, #[case] low: f64, #[case] high: f64) {
        let (lower, upper) = forecast_band(10.0, step);
        assert!((lower - 10.0 * low).abs() < 1e-9);
        assert!((upper - 10.0 * high).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(forecast_confidence(&[10.0; 12]), MAX_CONFIDENCE);
        assert_eq!(forecast_confidence(&[1.0, 100.0, 1.0]), MIN_CONFIDENCE);
    }

    #[test]
    fn test_flat_series_is_stationary() {
        let forecaster = SeasonalForecaster::default();
        let diagnostics = forecaster.diagnose(&[5.0; 14]);
        assert_eq!(diagnostics.seasonal_strength, 0.0);
        assert!(diagnostics.is_stationary);
        assert_eq!(diagnostics.differencing_order, 0);
        assert!(!diagnostics.seasonal_differencing);
    }

    #[test]
    fn test_rejects_short_series() {
        let series = TimeSeries::from_values(&[1.0; 12]).unwrap();
        let result = SeasonalForecaster::default().forecast(&series, 3);
        assert!(matches!(
            result,
            Err(ForecastError::InsufficientData {
                required: 14,
                actual: 12
            })
        ));
    }

    #[test]
    fn test_large_values_stay_finite() {
        let series = TimeSeries::from_values(&[1e300; 14]).unwrap();
        let predictions = SeasonalForecaster::default()
            .forecast_values(&series, 4, 0.0)
            .unwrap();
        assert_eq!(predictions.len(), 4);
        assert!(predictions.iter().all(|p| p.is_finite()));
    }
}
