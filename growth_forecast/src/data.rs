//! Daily time series handling for forecasting

use crate::domain::DAYS_PER_MONTH;
use crate::error::{ForecastError, Result};
use crate::record::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

/// One aggregated reading for a single day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Whole days since the subject's tracking start
    day_index: u32,
    /// Size metric value
    value: f64,
    /// Environmental covariates by name
    covariates: BTreeMap<String, f64>,
}

impl Measurement {
    pub fn new(day_index: u32, value: f64) -> Self {
        Self {
            day_index,
            value,
            covariates: BTreeMap::new(),
        }
    }

    pub fn with_covariates(mut self, covariates: BTreeMap<String, f64>) -> Self {
        self.covariates = covariates;
        self
    }

    pub fn with_covariate(mut self, name: &str, value: f64) -> Self {
        self.covariates.insert(name.to_string(), value);
        self
    }

    pub fn day_index(&self) -> u32 {
        self.day_index
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn covariates(&self) -> &BTreeMap<String, f64> {
        &self.covariates
    }

    pub fn covariate(&self, name: &str) -> Option<f64> {
        self.covariates.get(name).copied()
    }
}

/// Ordered daily series with strictly increasing day indices.
///
/// Every value is finite and positive. Day indices may have gaps; they are
/// never reindexed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimeSeries {
    measurements: Vec<Measurement>,
}

impl TimeSeries {
    /// Create a series, validating ordering and values
    pub fn new(measurements: Vec<Measurement>) -> Result<Self> {
        for pair in measurements.windows(2) {
            if pair[1].day_index <= pair[0].day_index {
                return Err(ForecastError::ValidationError(format!(
                    "day indices must be strictly increasing, found {} after {}",
                    pair[1].day_index, pair[0].day_index
                )));
            }
        }
        if let Some(bad) = measurements
            .iter()
            .find(|m| !m.value.is_finite() || m.value <= 0.0)
        {
            return Err(ForecastError::ValidationError(format!(
                "value {} on day {} is not a finite positive number",
                bad.value, bad.day_index
            )));
        }

        Ok(Self { measurements })
    }

    /// Create a series from consecutive values starting at day 0
    pub fn from_values(values: &[f64]) -> Result<Self> {
        Self::new(
            values
                .iter()
                .enumerate()
                .map(|(day, &value)| Measurement::new(day as u32, value))
                .collect(),
        )
    }

    /// Create a series from `(day_index, value)` pairs
    pub fn from_points(points: &[(u32, f64)]) -> Result<Self> {
        Self::new(
            points
                .iter()
                .map(|&(day, value)| Measurement::new(day, value))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    pub fn values(&self) -> Vec<f64> {
        self.measurements.iter().map(|m| m.value).collect()
    }

    /// Day indices as floats, for use as the regression axis
    pub fn day_indices(&self) -> Vec<f64> {
        self.measurements
            .iter()
            .map(|m| f64::from(m.day_index))
            .collect()
    }

    pub fn last(&self) -> Option<&Measurement> {
        self.measurements.last()
    }

    /// Fail with [`ForecastError::InsufficientData`] below `min` points
    pub fn require(&self, min: usize) -> Result<&Self> {
        if self.len() < min {
            return Err(ForecastError::InsufficientData {
                required: min,
                actual: self.len(),
            });
        }
        Ok(self)
    }

    /// Mean covariates over the last `window` measurements
    pub fn recent_covariates(&self, window: usize) -> BTreeMap<String, f64> {
        let tail = &self.measurements[self.len().saturating_sub(window)..];
        let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
        for measurement in tail {
            for (name, value) in &measurement.covariates {
                let entry = sums.entry(name.clone()).or_insert((0.0, 0));
                entry.0 += value;
                entry.1 += 1;
            }
        }
        sums.into_iter()
            .map(|(name, (sum, count))| (name, sum / count as f64))
            .collect()
    }
}

/// A literature value anchoring a growth curve at a known age
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceCalibrationPoint {
    pub age_in_days: u32,
    pub value: f64,
}

impl ReferenceCalibrationPoint {
    pub fn new(age_in_days: u32, value: f64) -> Self {
        Self { age_in_days, value }
    }

    /// Convert a literature value given at an age in months
    pub fn from_months(months: f64, value: f64) -> Self {
        Self {
            age_in_days: (months * DAYS_PER_MONTH).round().max(0.0) as u32,
            value,
        }
    }
}

/// A record already averaged upstream for one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub day_index: u32,
    pub fields: Record,
}

/// Column names accepted for the day index in daily files
const DAY_COLUMNS: [&str; 3] = ["day", "day_index", "dayIndex"];

/// Data loader for daily aggregate files
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load daily records from a CSV file with a header row.
    ///
    /// One column must hold the day index; every other column becomes a
    /// record field, numeric where it parses. Rows whose day index cannot
    /// be read are dropped.
    pub fn daily_records_from_csv<P: AsRef<Path>>(path: P) -> Result<Vec<DailyRecord>> {
        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();

        let day_column = headers
            .iter()
            .position(|name| DAY_COLUMNS.contains(&name.trim()))
            .ok_or_else(|| {
                ForecastError::UpstreamFormat("no day index column found in data".to_string())
            })?;

        let mut records = Vec::new();
        for (row, line) in reader.records().enumerate() {
            let line = line?;
            let day_index = match line.get(day_column).map(|v| v.trim().parse::<u32>()) {
                Some(Ok(day)) => day,
                _ => {
                    warn!(row, "dropping daily row without a valid day index");
                    continue;
                }
            };

            let fields = headers
                .iter()
                .zip(line.iter())
                .enumerate()
                .filter(|(column, _)| *column != day_column)
                .filter(|(_, (_, raw))| !raw.trim().is_empty())
                .map(|(_, (name, raw))| (name.trim().to_string(), cell_value(raw)))
                .collect();

            records.push(DailyRecord { day_index, fields });
        }

        Ok(records)
    }
}

fn cell_value(raw: &str) -> Value {
    match raw.trim().parse::<f64>() {
        Ok(number) => Value::from(number),
        Err(_) => Value::from(raw.trim()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_rejects_unordered_days() {
        let result = TimeSeries::from_points(&[(0, 1.0), (2, 2.0), (2, 3.0)]);
        assert!(matches!(result, Err(ForecastError::ValidationError(_))));
    }

    #[test]
    fn test_series_rejects_non_positive_values() {
        assert!(TimeSeries::from_values(&[1.0, 0.0]).is_err());
        assert!(TimeSeries::from_values(&[1.0, f64::INFINITY]).is_err());
    }

    #[test]
    fn test_series_keeps_gaps() {
        let series = TimeSeries::from_points(&[(0, 1.0), (3, 2.0), (9, 3.0)]).unwrap();
        assert_eq!(series.day_indices(), vec![0.0, 3.0, 9.0]);
        assert_eq!(series.values(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_require_reports_actual_count() {
        let series = TimeSeries::from_values(&[1.0, 2.0]).unwrap();
        match series.require(5) {
            Err(ForecastError::InsufficientData { required, actual }) => {
                assert_eq!(required, 5);
                assert_eq!(actual, 2);
            }
            other => panic!("expected insufficient data, got {:?}", other),
        }
    }

    #[test]
    fn test_recent_covariates_average_the_tail() {
        let series = TimeSeries::new(vec![
            Measurement::new(0, 1.0).with_covariate("temperature", 10.0),
            Measurement::new(1, 1.1).with_covariate("temperature", 12.0),
            Measurement::new(2, 1.2).with_covariate("temperature", 14.0),
        ])
        .unwrap();
        let recent = series.recent_covariates(2);
        assert_eq!(recent["temperature"], 13.0);
    }
}
