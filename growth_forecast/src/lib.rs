//! # Growth Forecast
//!
//! A Rust library for forecasting biological growth from noisy, irregular
//! sensor measurements.
//!
//! ## Features
//!
//! - Concurrent day-window aggregation into gap-preserving daily series
//! - Per-domain field resolution for loosely shaped upstream records
//! - Forecasting models (linear trend, covariate-driven saturation growth,
//!   simplified seasonal ARIMA)
//! - Two tracked subjects: an aquatic animal (length, weight) and a plant
//!   (height, leaf count)
//! - A synthetic data source for demos and tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use growth_forecast::config::{DataMode, EngineConfig};
//! use growth_forecast::domain::Subject;
//! use growth_forecast::facade::PredictionFacade;
//! use growth_forecast::utils::now_seconds;
//!
//! # async fn run() -> growth_forecast::error::Result<()> {
//! let mut config = EngineConfig::load()?;
//! config.data_mode = DataMode::Synthetic;
//!
//! let facade = PredictionFacade::new(config);
//! let forecast = facade.forecast_subject(Subject::Aquatic, 14, now_seconds()).await;
//! println!("{}", forecast.to_json()?);
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod facade;
pub mod metrics;
pub mod models;
pub mod record;
pub mod source;
pub mod telemetry;
pub mod utils;

// Re-export commonly used types
pub use crate::aggregator::Aggregator;
pub use crate::config::EngineConfig;
pub use crate::data::{DataLoader, Measurement, ReferenceCalibrationPoint, TimeSeries};
pub use crate::domain::{Metric, Subject};
pub use crate::error::ForecastError;
pub use crate::facade::{PredictionFacade, SubjectForecast};
pub use crate::models::{
    FitResult, ForecastModel, ForecastResult, LinearTrendFitter, ModelParameters,
    SaturationGrowthFitter, SeasonalForecaster,
};
pub use crate::record::{FieldResolver, Record};
pub use crate::source::{BatchSource, DailyBatchSource, SyntheticSource};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
