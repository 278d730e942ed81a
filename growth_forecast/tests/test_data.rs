use growth_forecast::aggregator::Aggregator;
use growth_forecast::data::DataLoader;
use growth_forecast::domain::{Metric, Subject};
use growth_forecast::source::{CsvDailySource, DailyBatchSource};
use growth_forecast::ForecastError;
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::io::Write;
use tempfile::NamedTempFile;

// Helper function to create a daily aggregate file
fn create_daily_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();

    writeln!(file, "day,height,humidity,light").unwrap();
    writeln!(file, "0,12.0,62.0,11000").unwrap();
    writeln!(file, "1,12.6,,12500").unwrap();
    writeln!(file, "two,13.0,60.0,12000").unwrap();
    writeln!(file, "3,13.9,58.0,13000").unwrap();
    writeln!(file, "3,14.1,60.0,13000").unwrap();
    writeln!(file, "4,n/a,61.0,12000").unwrap();

    file
}

#[test]
fn test_csv_loader_parses_rows() {
    let file = create_daily_file();
    let records = DataLoader::daily_records_from_csv(file.path()).unwrap();

    // the row with an unreadable day is dropped
    assert_eq!(records.len(), 5);
    assert_eq!(records[0].day_index, 0);
    assert_eq!(records[0].fields.get("height"), Some(&Value::from(12.0)));
    assert_eq!(records[1].fields.get("humidity"), None);
    assert_eq!(records[4].fields.get("height"), Some(&Value::from("n/a")));
}

#[test]
fn test_csv_without_day_column_is_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "date,height").unwrap();
    writeln!(file, "2024-01-01,12.0").unwrap();

    let result = DataLoader::daily_records_from_csv(file.path());
    assert!(matches!(result, Err(ForecastError::UpstreamFormat(_))));
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = DataLoader::daily_records_from_csv(dir.path().join("absent.csv"));
    assert!(result.is_err());
}

#[tokio::test]
async fn test_csv_source_builds_daily_series() {
    let file = create_daily_file();
    let source = CsvDailySource::new(Subject::Plant, file.path());
    let batch = source.get_daily_batch().await.unwrap();
    assert_eq!(batch.metadata.subject, Subject::Plant);

    let resolver = Subject::Plant.resolver(Metric::Height);
    let series = Aggregator::from_daily(&batch, &resolver).unwrap();

    assert_eq!(series.day_indices(), vec![0.0, 1.0, 3.0]);
    let values = series.values();
    assert!((values[2] - 14.0).abs() < 1e-9);
    // blank humidity falls back to the plant default
    assert_eq!(series.measurements()[1].covariate("humidity"), Some(60.0));
}
