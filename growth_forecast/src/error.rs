//! Error types for the growth_forecast crate

use growth_math::MathError;
use thiserror::Error;

/// Custom error types for the growth_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Fewer valid points than a component's minimum; never padded
    #[error("Insufficient data: need at least {required} points, have {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// Collinear or constant regression input
    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    /// A single day-window request exceeded its budget
    #[error("Request for window [{start_seconds}, {end_seconds}) timed out after {timeout_ms} ms")]
    Timeout {
        start_seconds: i64,
        end_seconds: i64,
        timeout_ms: u64,
    },

    /// A record's shape does not match any field-resolution rule
    #[error("Upstream format error: {0}")]
    UpstreamFormat(String),

    /// The data source reported a failure
    #[error("Source error: {0}")]
    Source(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error related to input validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Error from configuration loading
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from CSV parsing
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Error from JSON encoding
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<MathError> for ForecastError {
    fn from(err: MathError) -> Self {
        match err {
            MathError::InsufficientData { required, actual } => {
                ForecastError::InsufficientData { required, actual }
            }
            MathError::DegenerateInput(msg) => ForecastError::DegenerateInput(msg),
            MathError::InvalidInput(msg) => ForecastError::ValidationError(msg),
        }
    }
}

impl ForecastError {
    /// Whether a caller could reasonably ask again later and succeed
    pub fn is_data_shortage(&self) -> bool {
        matches!(
            self,
            ForecastError::InsufficientData { .. }
                | ForecastError::Timeout { .. }
                | ForecastError::Source(_)
        )
    }
}
