//! # Growth Engine
//!
//! Workspace facade re-exporting the numeric kernels and the forecasting
//! engine.
//!
//! ## Example
//!
//! ```
//! use growth_engine_workspace::forecast::{LinearTrendFitter, TimeSeries};
//! use growth_engine_workspace::forecast::ForecastModel;
//!
//! let values: Vec<f64> = (0..20).map(|i| 10.0 + 0.5 * i as f64).collect();
//! let series = TimeSeries::from_values(&values).unwrap();
//! let forecast = LinearTrendFitter::default().forecast(&series, 5).unwrap();
//! assert!((forecast.predicted_value - 22.0).abs() < 1e-9);
//! ```

pub use growth_forecast as forecast;
pub use growth_math as math;

pub use growth_forecast::{
    EngineConfig, ForecastError, ForecastResult, Metric, PredictionFacade, Subject, TimeSeries,
};
pub use growth_math::LinearRegression;
