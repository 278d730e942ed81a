//! # Growth Math
//!
//! Numeric building blocks shared by the growth forecasting models.
//! This crate provides ordinary least squares regression, summary
//! statistics, autocorrelation and the series transforms (moving averages,
//! regular and seasonal differencing) the forecasters are assembled from.

use thiserror::Error;

pub mod moving_averages;
pub mod regression;
pub mod statistics;

pub use regression::LinearRegression;

/// Errors that can occur in growth-related calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: need {required} points, have {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for growth math operations
pub type Result<T> = std::result::Result<T, MathError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data_message_carries_counts() {
        let err = MathError::InsufficientData {
            required: 5,
            actual: 2,
        };
        let message = err.to_string();
        assert!(message.contains("need 5"));
        assert!(message.contains("have 2"));
    }
}
