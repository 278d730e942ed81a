//! Data sources feeding the aggregator
//!
//! Two inbound shapes exist: raw record batches for arbitrary time windows,
//! and daily aggregates already averaged upstream. Both are async traits so
//! that network-backed implementations can be plugged in by the host.

use crate::data::{DailyRecord, DataLoader};
use crate::domain::{Metric, Subject};
use crate::error::{ForecastError, Result};
use crate::record::Record;
use crate::utils::{days_since, SECONDS_PER_DAY};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::f64::consts::TAU;
use std::path::PathBuf;
use tracing::debug;

/// Raw measurement batches for `[start_seconds, end_seconds)` windows
#[async_trait]
pub trait BatchSource: Send + Sync {
    async fn get_batch(&self, start_seconds: i64, end_seconds: i64) -> Result<Vec<Record>>;
}

/// Daily aggregates for a subject
#[async_trait]
pub trait DailyBatchSource: Send + Sync {
    async fn get_daily_batch(&self) -> Result<DailyBatch>;
}

/// Provenance of a daily batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchMetadata {
    pub subject: Subject,
    pub source: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBatch {
    pub records: Vec<DailyRecord>,
    pub metadata: BatchMetadata,
}

/// Share of synthetic records carrying an unreadable metric value
const MALFORMED_RATE: f64 = 0.05;
/// Relative standard deviation of synthetic metric noise
const METRIC_NOISE: f64 = 0.02;
/// Period in days of the synthetic covariate cycle
const COVARIATE_CYCLE_DAYS: f64 = 7.0;

/// Seeded stand-in for the live sensor backend.
///
/// Every window is generated from its own RNG derived from the seed and the
/// window start, so identical requests always return identical batches.
/// Readings rotate through the known field-name variants (primary, alias,
/// nested) so the resolution tables get exercised.
///
/// Values follow each metric's reference curve on the age axis, with the
/// rate scaled by the day's covariate effects; under the neutral profile
/// the curve passes through the literature anchors.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    subject: Subject,
    tracking_start_seconds: i64,
    age_at_tracking_start_days: u32,
    seed: u64,
    failure_rate: f64,
    readings_per_day: usize,
    history_days: u32,
}

impl SyntheticSource {
    pub fn new(subject: Subject, tracking_start_seconds: i64, seed: u64) -> Self {
        Self {
            subject,
            tracking_start_seconds,
            age_at_tracking_start_days: 0,
            seed,
            failure_rate: 0.0,
            readings_per_day: 4,
            history_days: 30,
        }
    }

    /// Probability that a window request fails outright
    pub fn with_failure_rate(mut self, failure_rate: f64) -> Self {
        self.failure_rate = if failure_rate.is_nan() {
            0.0
        } else {
            failure_rate.clamp(0.0, 1.0)
        };
        self
    }

    pub fn with_readings_per_day(mut self, readings_per_day: usize) -> Self {
        self.readings_per_day = readings_per_day;
        self
    }

    pub fn with_age_at_tracking_start(mut self, days: u32) -> Self {
        self.age_at_tracking_start_days = days;
        self
    }

    /// Days covered by the daily-aggregate path
    pub fn with_history_days(mut self, history_days: u32) -> Self {
        self.history_days = history_days;
        self
    }

    pub fn subject(&self) -> Subject {
        self.subject
    }

    /// Noise-free metric value at `age_days` under the given covariates
    pub fn truth(metric: Metric, age_days: f64, covariates: &BTreeMap<String, f64>) -> f64 {
        let subject = metric.subject();
        let curve = metric.reference_curve();
        let neutral: f64 = subject.effects(&subject.neutral_profile()).iter().sum();
        let actual: f64 = subject.effects(covariates).iter().sum();
        let (low, high) = subject.growth_rate_band();
        let rate = (curve.rate * actual / neutral.max(1e-6)).clamp(low, high);
        curve.value_with_rate(rate, age_days)
    }

    fn rng_for(&self, key: i64) -> StdRng {
        StdRng::seed_from_u64(self.seed ^ (key as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }

    fn covariates_at(&self, t: f64) -> BTreeMap<String, f64> {
        let cycle = (TAU * t / COVARIATE_CYCLE_DAYS).sin();
        let values = match self.subject {
            Subject::Aquatic => [
                ("temperature", 15.0 + 3.0 * cycle),
                ("dissolved_oxygen", 7.5 + 0.5 * cycle),
                ("ph", 7.2 - 0.2 * cycle),
            ],
            Subject::Plant => [
                ("temperature", 22.0 + 4.0 * cycle),
                ("humidity", 65.0 - 10.0 * cycle),
                ("light", 12_000.0 + 4_000.0 * cycle),
            ],
        };
        values
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect()
    }

    /// One reading `t` days after tracking start, written under the `variant`-th naming scheme
    fn reading<R: Rng>(&self, rng: &mut R, t: f64, variant: usize) -> Record {
        let mut fields = Map::new();
        let covariates = self.covariates_at(t);
        let age = t + f64::from(self.age_at_tracking_start_days);

        for &metric in self.subject.metrics() {
            let noise: f64 = rng.sample(StandardNormal);
            let value = Self::truth(metric, age, &covariates) * (1.0 + METRIC_NOISE * noise);
            let value = if rng.gen_bool(MALFORMED_RATE) {
                Value::from("n/a")
            } else {
                Value::from(value)
            };
            set_path(&mut fields, pick(metric.accessors(), variant), value);
        }

        for (name, value) in &covariates {
            if let Some(spec) = self.subject.covariates().iter().find(|s| s.name == name.as_str()) {
                let noise: f64 = rng.sample(StandardNormal);
                set_path(
                    &mut fields,
                    pick(spec.accessors, variant),
                    Value::from(value * (1.0 + 0.01 * noise)),
                );
            }
        }

        Record::from(fields)
    }
}

/// Primary name, first alias, or the nested path
fn pick<'a>(accessors: &[&'a str], variant: usize) -> &'a str {
    match variant % 3 {
        0 => accessors[0],
        1 => accessors[1.min(accessors.len() - 1)],
        _ => accessors[accessors.len() - 1],
    }
}

/// Insert `value` under a plain or dotted key, creating nested objects
fn set_path(fields: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            fields.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = fields
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(map) = child {
                set_path(map, rest, value);
            }
        }
    }
}

#[async_trait]
impl BatchSource for SyntheticSource {
    async fn get_batch(&self, start_seconds: i64, end_seconds: i64) -> Result<Vec<Record>> {
        let mut rng = self.rng_for(start_seconds);
        if rng.gen_bool(self.failure_rate) {
            return Err(ForecastError::Source(format!(
                "synthetic outage for window starting at {}",
                start_seconds
            )));
        }

        let start = days_since(self.tracking_start_seconds, start_seconds);
        if start < 0.0 {
            return Ok(Vec::new());
        }
        let span = days_since(start_seconds, end_seconds).max(0.0);
        let count = self.readings_per_day.max(1);

        let records = (0..self.readings_per_day)
            .map(|i| {
                let t = start + span * (i as f64 + 0.5) / count as f64;
                self.reading(&mut rng, t, i)
            })
            .collect::<Vec<_>>();

        debug!(
            subject = %self.subject,
            start_seconds,
            records = records.len(),
            "synthetic batch"
        );
        Ok(records)
    }
}

#[async_trait]
impl DailyBatchSource for SyntheticSource {
    async fn get_daily_batch(&self) -> Result<DailyBatch> {
        let records = (0..self.history_days)
            .filter_map(|day_index| {
                let mut rng = self.rng_for(i64::from(day_index) * SECONDS_PER_DAY);
                if rng.gen_bool(self.failure_rate) {
                    return None;
                }
                let fields = self.reading(&mut rng, f64::from(day_index) + 0.5, 0);
                Some(DailyRecord { day_index, fields })
            })
            .collect();

        Ok(DailyBatch {
            records,
            metadata: BatchMetadata {
                subject: self.subject,
                source: "synthetic".to_string(),
                generated_at: Utc::now(),
            },
        })
    }
}

/// Daily aggregates read from a CSV file on every request
#[derive(Debug, Clone)]
pub struct CsvDailySource {
    subject: Subject,
    path: PathBuf,
}

impl CsvDailySource {
    pub fn new(subject: Subject, path: impl Into<PathBuf>) -> Self {
        Self {
            subject,
            path: path.into(),
        }
    }
}

#[async_trait]
impl DailyBatchSource for CsvDailySource {
    async fn get_daily_batch(&self) -> Result<DailyBatch> {
        let path = self.path.clone();
        let records = tokio::task::spawn_blocking(move || DataLoader::daily_records_from_csv(path))
            .await
            .map_err(|err| ForecastError::Source(format!("CSV reader task failed: {}", err)))??;

        Ok(DailyBatch {
            records,
            metadata: BatchMetadata {
                subject: self.subject,
                source: self.path.display().to_string(),
                generated_at: Utc::now(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Accessor;

    #[test]
    fn test_set_path_builds_nested_objects() {
        let mut fields = Map::new();
        set_path(&mut fields, "sensors.temperature", Value::from(14.5));
        set_path(&mut fields, "sensors.ph", Value::from(7.1));
        let record = Record::from(fields);

        let accessor = Accessor::from("sensors.ph");
        assert_eq!(accessor.lookup(&record), Some(&Value::from(7.1)));
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_pick_rotates_naming_schemes() {
        let accessors = Metric::Length.accessors();
        assert_eq!(pick(accessors, 0), "length");
        assert_eq!(pick(accessors, 1), "fish_length");
        assert_eq!(pick(accessors, 2), "measurements.length");
        assert_eq!(pick(accessors, 3), "length");
    }

    #[tokio::test]
    async fn test_batches_are_reproducible() {
        let source = SyntheticSource::new(Subject::Aquatic, 0, 42);
        let first = source.get_batch(SECONDS_PER_DAY, 2 * SECONDS_PER_DAY).await.unwrap();
        let second = source.get_batch(SECONDS_PER_DAY, 2 * SECONDS_PER_DAY).await.unwrap();
        assert_eq!(first.len(), 4);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_windows_before_tracking_start_are_empty() {
        let source = SyntheticSource::new(Subject::Plant, 10 * SECONDS_PER_DAY, 1);
        let batch = source.get_batch(0, SECONDS_PER_DAY).await.unwrap();
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn test_full_failure_rate_always_fails() {
        let source = SyntheticSource::new(Subject::Plant, 0, 1).with_failure_rate(1.0);
        let result = source.get_batch(0, SECONDS_PER_DAY).await;
        assert!(matches!(result, Err(ForecastError::Source(_))));

        let daily = source.get_daily_batch().await.unwrap();
        assert!(daily.records.is_empty());
    }

    #[test]
    fn test_truth_curve_saturates() {
        let neutral = Subject::Plant.neutral_profile();
        let early = SyntheticSource::truth(Metric::Height, 0.0, &neutral);
        let late = SyntheticSource::truth(Metric::Height, 1_000.0, &neutral);
        assert!(early < late);
        assert!(late <= 120.0);
    }

    #[test]
    fn test_truth_meets_literature_under_neutral_profile() {
        let neutral = Subject::Aquatic.neutral_profile();
        for point in Metric::Length.calibration_points() {
            let value = SyntheticSource::truth(Metric::Length, f64::from(point.age_in_days), &neutral);
            assert!((value - point.value).abs() / point.value < 0.01);
        }
    }

    #[test]
    fn test_warmer_days_grow_faster() {
        let mut warm = Subject::Aquatic.neutral_profile();
        warm.insert("temperature".to_string(), 18.0);
        let neutral = Subject::Aquatic.neutral_profile();
        assert!(
            SyntheticSource::truth(Metric::Length, 100.0, &warm)
                > SyntheticSource::truth(Metric::Length, 100.0, &neutral)
        );
    }

    #[tokio::test]
    async fn test_age_at_tracking_start_shifts_the_curve() {
        let young = SyntheticSource::new(Subject::Plant, 0, 4);
        let older = young.clone().with_age_at_tracking_start(60);

        let resolver = Subject::Plant.resolver(Metric::Height);
        let mean_height = |batch: DailyBatch| {
            let values: Vec<f64> = batch
                .records
                .iter()
                .filter_map(|record| resolver.resolve(&record.fields).ok())
                .map(|resolved| resolved.metric)
                .collect();
            values.iter().sum::<f64>() / values.len() as f64
        };

        let young_mean = mean_height(young.get_daily_batch().await.unwrap());
        let older_mean = mean_height(older.get_daily_batch().await.unwrap());
        assert!(older_mean > 2.0 * young_mean);
    }
}
