//! Forecasting models for daily growth series

use crate::data::TimeSeries;
use crate::error::{ForecastError, Result};
use crate::metrics::ForecastAccuracy;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Model-specific parameter vector produced by a fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelParameters(Vec<f64>);

impl ModelParameters {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.0.get(index).copied()
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.0
    }

    /// Fail unless exactly `expected` parameters are present
    pub(crate) fn expect_len(&self, expected: usize, model: &str) -> Result<()> {
        if self.0.len() != expected {
            return Err(ForecastError::InvalidParameter(format!(
                "{} expects {} parameters, got {}",
                model,
                expected,
                self.0.len()
            )));
        }
        Ok(())
    }
}

/// Outcome of fitting a model to a series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitResult {
    pub parameters: ModelParameters,
    /// Coefficient of determination on observed points, within `[0, 1]`
    pub r_squared: f64,
    /// Mean squared error on observed points
    pub error: f64,
}

/// Which model produced a forecast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    LinearTrend,
    SaturationGrowth,
    Seasonal,
}

/// Diagnostics of the seasonal path
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeasonalDiagnostics {
    pub seasonal_period: usize,
    /// Magnitude of the autocorrelation at the seasonal lag, within `[0, 1]`
    pub seasonal_strength: f64,
    pub is_stationary: bool,
    /// Regular differences applied while diagnosing (0 or 1)
    pub differencing_order: usize,
    /// Whether a seasonal difference was applied as well
    pub seasonal_differencing: bool,
}

/// Model-specific diagnostics attached to a forecast
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastDiagnostics {
    pub points_used: usize,
    /// Present on the regression and growth paths
    pub r_squared: Option<f64>,
    /// In-sample accuracy of the fitted curve
    pub in_sample: Option<ForecastAccuracy>,
    /// Present on the seasonal path
    pub seasonal: Option<SeasonalDiagnostics>,
}

impl ForecastDiagnostics {
    pub fn new(points_used: usize) -> Self {
        Self {
            points_used,
            r_squared: None,
            in_sample: None,
            seasonal: None,
        }
    }
}

/// Forecast handed to the display layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastResult {
    pub model: ModelKind,
    pub horizon_days: usize,
    /// Last observed value
    pub current_value: f64,
    /// Value at the end of the horizon
    pub predicted_value: f64,
    /// `max(0, predicted_value - current_value)`
    pub expected_growth: f64,
    /// One value per future day
    pub daily_predictions: Vec<f64>,
    /// Within `[0, 1]`
    pub confidence: f64,
    pub diagnostics: ForecastDiagnostics,
}

impl ForecastResult {
    /// Create a forecast result from its daily predictions
    pub fn new(
        model: ModelKind,
        current_value: f64,
        daily_predictions: Vec<f64>,
        confidence: f64,
        diagnostics: ForecastDiagnostics,
    ) -> Result<Self> {
        let predicted_value = *daily_predictions.last().ok_or_else(|| {
            ForecastError::InvalidParameter("forecast horizon must be positive".to_string())
        })?;

        Ok(Self {
            model,
            horizon_days: daily_predictions.len(),
            current_value,
            predicted_value,
            expected_growth: (predicted_value - current_value).max(0.0),
            daily_predictions,
            confidence: if confidence.is_finite() {
                confidence.clamp(0.0, 1.0)
            } else {
                0.0
            },
            diagnostics,
        })
    }

    /// Serialize for the display layer
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Common interface for the forecasting models
pub trait ForecastModel: Debug + Send + Sync {
    /// Name of the model
    fn name(&self) -> &str;

    fn kind(&self) -> ModelKind;

    /// Fit the series and forecast `horizon` days past its last day
    fn forecast(&self, series: &TimeSeries, horizon: usize) -> Result<ForecastResult>;
}

/// Reject a zero horizon before any fitting work
pub(crate) fn check_horizon(horizon: usize) -> Result<()> {
    if horizon == 0 {
        return Err(ForecastError::InvalidParameter(
            "forecast horizon must be positive".to_string(),
        ));
    }
    Ok(())
}

pub mod linear_trend;
pub mod saturation;
pub mod seasonal;

pub use linear_trend::LinearTrendFitter;
pub use saturation::SaturationGrowthFitter;
pub use seasonal::SeasonalForecaster;
