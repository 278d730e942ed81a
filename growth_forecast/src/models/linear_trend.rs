//! Straight-line trend model over day indices

use crate::data::TimeSeries;
use crate::error::Result;
use crate::metrics::forecast_accuracy;
use crate::models::{
    check_horizon, FitResult, ForecastDiagnostics, ForecastModel, ForecastResult, ModelKind,
    ModelParameters,
};
use growth_math::LinearRegression;

/// Minimum points for the regression-only path
pub const DEFAULT_MIN_POINTS: usize = 5;

/// Ordinary least squares trend; parameters are `[slope, intercept]`
#[derive(Debug, Clone)]
pub struct LinearTrendFitter {
    /// Name of the model
    name: String,
    /// Points required before fitting
    min_points: usize,
}

impl Default for LinearTrendFitter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_POINTS)
    }
}

impl LinearTrendFitter {
    /// Create a fitter; at least two points are always required
    pub fn new(min_points: usize) -> Self {
        let min_points = min_points.max(2);
        Self {
            name: format!("Linear Trend (min_points={})", min_points),
            min_points,
        }
    }

    /// Fit `y` against `x`
    pub fn fit(x: &[f64], y: &[f64]) -> Result<FitResult> {
        let line = LinearRegression::fit(x, y)?;
        Ok(FitResult {
            parameters: ModelParameters::new(vec![line.slope(), line.intercept()]),
            r_squared: line.r_squared(),
            error: line.mean_squared_error(),
        })
    }

    /// Evaluate fitted parameters at `x_future`
    pub fn predict(params: &ModelParameters, x_future: f64) -> Result<f64> {
        params.expect_len(2, "linear trend")?;
        let slope = params.as_slice()[0];
        let intercept = params.as_slice()[1];
        Ok(slope * x_future + intercept)
    }

    /// Fit a series using its own day indices as `x`
    pub fn fit_series(&self, series: &TimeSeries) -> Result<FitResult> {
        series.require(self.min_points)?;
        Self::fit(&series.day_indices(), &series.values())
    }
}

impl ForecastModel for LinearTrendFitter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ModelKind {
        ModelKind::LinearTrend
    }

    fn forecast(&self, series: &TimeSeries, horizon: usize) -> Result<ForecastResult> {
        check_horizon(horizon)?;
        let fit = self.fit_series(series)?;

        let days = series.day_indices();
        let values = series.values();
        let fitted = days
            .iter()
            .map(|&day| Self::predict(&fit.parameters, day))
            .collect::<Result<Vec<f64>>>()?;

        // fit_series guarantees at least two points
        let last_day = days[days.len() - 1];
        let current_value = values[values.len() - 1];
        let daily_predictions = (1..=horizon)
            .map(|step| Self::predict(&fit.parameters, last_day + step as f64))
            .collect::<Result<Vec<f64>>>()?;

        let mut diagnostics = ForecastDiagnostics::new(series.len());
        diagnostics.r_squared = Some(fit.r_squared);
        diagnostics.in_sample = Some(forecast_accuracy(&fitted, &values)?);

        ForecastResult::new(
            ModelKind::LinearTrend,
            current_value,
            daily_predictions,
            fit.r_squared,
            diagnostics,
        )
    }
}
