use growth_forecast::ForecastError;
use growth_math::MathError;
use std::io;

#[test]
fn test_insufficient_data_reports_counts() {
    let error = ForecastError::InsufficientData {
        required: 14,
        actual: 3,
    };
    assert_eq!(
        error.to_string(),
        "Insufficient data: need at least 14 points, have 3"
    );
    assert!(error.is_data_shortage());
}

#[test]
fn test_timeout_display() {
    let error = ForecastError::Timeout {
        start_seconds: 0,
        end_seconds: 86_400,
        timeout_ms: 10_000,
    };
    assert_eq!(
        error.to_string(),
        "Request for window [0, 86400) timed out after 10000 ms"
    );
}

#[test]
fn test_math_errors_map_onto_taxonomy() {
    let degenerate: ForecastError = MathError::DegenerateInput("collinear x".to_string()).into();
    assert!(matches!(degenerate, ForecastError::DegenerateInput(_)));
    assert!(!degenerate.is_data_shortage());

    let short: ForecastError = MathError::InsufficientData {
        required: 2,
        actual: 1,
    }
    .into();
    assert!(matches!(
        short,
        ForecastError::InsufficientData {
            required: 2,
            actual: 1
        }
    ));

    let invalid: ForecastError = MathError::InvalidInput("NaN sample".to_string()).into();
    assert!(matches!(invalid, ForecastError::ValidationError(_)));
}

#[test]
fn test_io_error_conversion() {
    let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
    let error: ForecastError = io_error.into();
    assert!(matches!(error, ForecastError::IoError(_)));
    assert_eq!(error.to_string(), "IO error: file not found");
}
