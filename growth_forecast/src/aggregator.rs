//! Builds daily series out of windowed or pre-aggregated source data
//!
//! Each day window is requested independently. A window that fails, times
//! out or carries no usable value is skipped rather than zero-filled, so the
//! resulting series keeps the original day indices and may have gaps.

use crate::config::EngineConfig;
use crate::data::{Measurement, TimeSeries};
use crate::error::{ForecastError, Result};
use crate::record::{FieldResolver, Record};
use crate::source::{BatchSource, DailyBatch, DailyBatchSource};
use crate::utils::{tracked_day_windows, DayWindow};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Running sums for one day
#[derive(Debug, Default)]
struct DayAccumulator {
    sum: f64,
    count: usize,
    covariates: BTreeMap<String, (f64, usize)>,
}

impl DayAccumulator {
    fn add(&mut self, value: f64, covariates: &BTreeMap<String, f64>) {
        self.sum += value;
        self.count += 1;
        for (name, covariate) in covariates {
            let entry = self.covariates.entry(name.clone()).or_insert((0.0, 0));
            entry.0 += covariate;
            entry.1 += 1;
        }
    }

    fn finish(self, day_index: u32) -> Option<Measurement> {
        if self.count == 0 {
            return None;
        }
        let covariates = self
            .covariates
            .into_iter()
            .map(|(name, (sum, count))| (name, sum / count as f64))
            .collect();
        Some(Measurement::new(day_index, self.sum / self.count as f64).with_covariates(covariates))
    }
}

/// Resolve every record and fold the valid ones into `day`.
///
/// Records without a readable metric are dropped, as are non-positive and
/// non-finite values.
fn accumulate(
    day: &mut DayAccumulator,
    day_index: u32,
    records: &[Record],
    resolver: &FieldResolver,
) {
    for record in records {
        match resolver.resolve(record) {
            Ok(resolved) if resolved.metric.is_finite() && resolved.metric > 0.0 => {
                day.add(resolved.metric, &resolved.covariates);
            }
            Ok(resolved) => {
                debug!(day_index, value = resolved.metric, "discarding non-positive value");
            }
            Err(err) => {
                debug!(day_index, error = %err, "dropping record");
            }
        }
    }
}

/// Concurrent day-window collector
#[derive(Debug, Clone)]
pub struct Aggregator {
    window_timeout: Duration,
    max_in_flight: usize,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl Aggregator {
    pub fn new(window_timeout: Duration, max_in_flight: usize) -> Self {
        Self {
            window_timeout,
            max_in_flight: max_in_flight.max(1),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.window_timeout(), config.max_concurrent_requests)
    }

    pub fn window_timeout(&self) -> Duration {
        self.window_timeout
    }

    /// Collect the trailing `days` days ending at `end_seconds`, oldest day as day 0.
    ///
    /// Never fails because of a window; the result holds at most `days`
    /// points and callers check it against their own minimum.
    pub async fn collect(
        &self,
        source: Arc<dyn BatchSource>,
        resolver: Arc<FieldResolver>,
        days: u32,
        end_seconds: i64,
    ) -> Result<TimeSeries> {
        self.collect_tracked(source, resolver, days, end_seconds, None).await
    }

    /// Like [`Aggregator::collect`], with day indices counted from
    /// `tracking_start_seconds`. Windows before tracking start are not requested.
    pub async fn collect_tracked(
        &self,
        source: Arc<dyn BatchSource>,
        resolver: Arc<FieldResolver>,
        days: u32,
        end_seconds: i64,
        tracking_start_seconds: Option<i64>,
    ) -> Result<TimeSeries> {
        let semaphore = Arc::new(Semaphore::new(self.max_in_flight));
        let mut tasks = JoinSet::new();

        for window in tracked_day_windows(end_seconds, days, tracking_start_seconds) {
            let source = Arc::clone(&source);
            let semaphore = Arc::clone(&semaphore);
            let budget = self.window_timeout;
            tasks.spawn(async move {
                let outcome = fetch_window(source.as_ref(), &semaphore, window, budget).await;
                (window, outcome)
            });
        }

        let mut measurements = BTreeMap::new();
        let mut skipped = 0usize;
        while let Some(joined) = tasks.join_next().await {
            let (window, outcome) = match joined {
                Ok(pair) => pair,
                Err(err) => {
                    warn!(error = %err, "window task aborted");
                    skipped += 1;
                    continue;
                }
            };

            let records = match outcome {
                Ok(records) => records,
                Err(err) => {
                    warn!(day_index = window.day_index, error = %err, "skipping window");
                    skipped += 1;
                    continue;
                }
            };

            let mut day = DayAccumulator::default();
            accumulate(&mut day, window.day_index, &records, &resolver);
            match day.finish(window.day_index) {
                Some(measurement) => {
                    measurements.insert(window.day_index, measurement);
                }
                None => {
                    debug!(
                        day_index = window.day_index,
                        records = records.len(),
                        "no valid values"
                    );
                    skipped += 1;
                }
            }
        }

        info!(
            metric = resolver.metric_name(),
            requested_days = days,
            tracking_start = ?tracking_start_seconds,
            points = measurements.len(),
            skipped,
            "aggregated daily series"
        );

        TimeSeries::new(measurements.into_values().collect())
    }

    /// Build a series from daily aggregates; duplicate day indices are averaged
    pub fn from_daily(batch: &DailyBatch, resolver: &FieldResolver) -> Result<TimeSeries> {
        let mut days: BTreeMap<u32, DayAccumulator> = BTreeMap::new();
        for record in &batch.records {
            let day = days.entry(record.day_index).or_default();
            accumulate(day, record.day_index, std::slice::from_ref(&record.fields), resolver);
        }

        let measurements: Vec<Measurement> = days
            .into_iter()
            .filter_map(|(day_index, day)| day.finish(day_index))
            .collect();

        info!(
            metric = resolver.metric_name(),
            source = %batch.metadata.source,
            records = batch.records.len(),
            points = measurements.len(),
            "built series from daily aggregates"
        );

        TimeSeries::new(measurements)
    }

    /// Fetch a daily batch within the window budget and build its series
    pub async fn collect_daily(
        &self,
        source: &dyn DailyBatchSource,
        resolver: &FieldResolver,
    ) -> Result<TimeSeries> {
        let batch = timeout(self.window_timeout, source.get_daily_batch())
            .await
            .map_err(|_| ForecastError::Timeout {
                start_seconds: 0,
                end_seconds: 0,
                timeout_ms: self.window_timeout.as_millis() as u64,
            })??;
        Self::from_daily(&batch, resolver)
    }
}

async fn fetch_window(
    source: &dyn BatchSource,
    semaphore: &Semaphore,
    window: DayWindow,
    budget: Duration,
) -> Result<Vec<Record>> {
    let _permit = semaphore
        .acquire()
        .await
        .map_err(|err| ForecastError::Source(err.to_string()))?;

    debug!(
        day_index = window.day_index,
        start_seconds = window.start_seconds,
        "requesting window"
    );

    match timeout(budget, source.get_batch(window.start_seconds, window.end_seconds)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(ForecastError::Timeout {
            start_seconds: window.start_seconds,
            end_seconds: window.end_seconds,
            timeout_ms: budget.as_millis() as u64,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DailyRecord;
    use crate::domain::{Metric, Subject};
    use crate::source::BatchMetadata;
    use chrono::Utc;

    #[test]
    fn test_from_daily_averages_duplicate_days() {
        let resolver = Subject::Plant.resolver(Metric::Height);
        let batch = DailyBatch {
            records: vec![
                DailyRecord {
                    day_index: 3,
                    fields: Record::new().with("height", 10.0).with("humidity", 60.0),
                },
                DailyRecord {
                    day_index: 1,
                    fields: Record::new().with("plant_height", 8.0),
                },
                DailyRecord {
                    day_index: 3,
                    fields: Record::new().with("height", 12.0).with("humidity", 70.0),
                },
                DailyRecord {
                    day_index: 5,
                    fields: Record::new().with("height", -1.0),
                },
            ],
            metadata: BatchMetadata {
                subject: Subject::Plant,
                source: "test".to_string(),
                generated_at: Utc::now(),
            },
        };

        let series = Aggregator::from_daily(&batch, &resolver).unwrap();
        assert_eq!(series.day_indices(), vec![1.0, 3.0]);
        assert_eq!(series.values(), vec![8.0, 11.0]);
        assert_eq!(series.measurements()[1].covariate("humidity"), Some(65.0));
    }

    #[test]
    fn test_day_without_valid_values_is_skipped() {
        let resolver = Subject::Aquatic.resolver(Metric::Length);
        let mut day = DayAccumulator::default();
        let records = vec![
            Record::new().with("length", 0.0),
            Record::new().with("length", "broken"),
        ];
        accumulate(&mut day, 0, &records, &resolver);
        assert!(day.finish(0).is_none());
    }
}
