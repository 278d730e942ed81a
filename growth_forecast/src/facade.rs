//! Per-subject orchestration of aggregation and the three models
//!
//! Each metric runs its own pipeline and each model its own fit, so one
//! failure is reported against the metric or model that caused it and never
//! leaks into a sibling result.

use crate::aggregator::Aggregator;
use crate::config::{DataMode, EngineConfig};
use crate::data::TimeSeries;
use crate::domain::{Metric, Subject};
use crate::error::{ForecastError, Result};
use crate::models::{
    ForecastModel, ForecastResult, LinearTrendFitter, SaturationGrowthFitter, SeasonalForecaster,
};
use crate::record::FieldResolver;
use crate::source::{BatchSource, DailyBatchSource, SyntheticSource};
use crate::utils::SECONDS_PER_DAY;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Seed of the fallback synthetic source when none is configured
pub const DEFAULT_SYNTHETIC_SEED: u64 = 7;

/// The three model outcomes for one metric
#[derive(Debug)]
pub struct ModelForecasts {
    pub linear: Result<ForecastResult>,
    pub growth: Result<ForecastResult>,
    pub seasonal: Result<ForecastResult>,
}

impl ModelForecasts {
    fn to_value(&self) -> Result<Value> {
        Ok(json!({
            "linear": outcome_value(&self.linear)?,
            "growth": outcome_value(&self.growth)?,
            "seasonal": outcome_value(&self.seasonal)?,
        }))
    }
}

#[derive(Debug)]
pub struct MetricForecast {
    pub metric: Metric,
    /// Fails only when no series could be obtained for the metric
    pub outcome: Result<ModelForecasts>,
}

#[derive(Debug)]
pub struct SubjectForecast {
    pub subject: Subject,
    pub metrics: Vec<MetricForecast>,
}

impl SubjectForecast {
    pub fn metric(&self, metric: Metric) -> Option<&MetricForecast> {
        self.metrics.iter().find(|m| m.metric == metric)
    }

    /// Render for the display layer; failures appear as `{"error": ...}`
    pub fn to_json(&self) -> Result<String> {
        let metrics = self
            .metrics
            .iter()
            .map(|m| -> Result<Value> {
                let outcome = match &m.outcome {
                    Ok(models) => models.to_value()?,
                    Err(err) => error_value(err),
                };
                Ok(json!({ "metric": m.metric, "forecasts": outcome }))
            })
            .collect::<Result<Vec<Value>>>()?;

        Ok(serde_json::to_string_pretty(&json!({
            "subject": self.subject,
            "metrics": metrics,
        }))?)
    }
}

fn outcome_value<T: Serialize>(outcome: &Result<T>) -> Result<Value> {
    match outcome {
        Ok(value) => Ok(serde_json::to_value(value)?),
        Err(err) => Ok(error_value(err)),
    }
}

fn error_value(err: &ForecastError) -> Value {
    json!({ "error": err.to_string(), "data_shortage": err.is_data_shortage() })
}

/// Entry point used by the display layer
#[derive(Clone)]
pub struct PredictionFacade {
    config: EngineConfig,
    aggregator: Aggregator,
    sources: HashMap<Subject, Arc<dyn BatchSource>>,
    daily_sources: HashMap<Subject, Arc<dyn DailyBatchSource>>,
}

impl std::fmt::Debug for PredictionFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictionFacade")
            .field("config", &self.config)
            .field("aggregator", &self.aggregator)
            .field("sources", &self.sources.keys().collect::<Vec<_>>())
            .field("daily_sources", &self.daily_sources.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PredictionFacade {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            aggregator: Aggregator::from_config(&config),
            config,
            sources: HashMap::new(),
            daily_sources: HashMap::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Windowed source for a subject
    pub fn with_source(mut self, subject: Subject, source: Arc<dyn BatchSource>) -> Self {
        self.sources.insert(subject, source);
        self
    }

    /// Daily-aggregate source for a subject; preferred by the growth and seasonal paths
    pub fn with_daily_source(
        mut self,
        subject: Subject,
        source: Arc<dyn DailyBatchSource>,
    ) -> Self {
        self.daily_sources.insert(subject, source);
        self
    }

    /// Start of tracking for a subject.
    ///
    /// The configured value wins; in synthetic mode tracking otherwise begins
    /// `history_days` before `end_seconds`.
    fn tracking_start(&self, subject: Subject, end_seconds: i64) -> Option<i64> {
        let configured = self.config.subject(subject).tracking_start_seconds;
        match self.config.data_mode {
            DataMode::Synthetic => Some(configured.unwrap_or(
                end_seconds - i64::from(self.config.history_days) * SECONDS_PER_DAY,
            )),
            DataMode::Live => configured,
        }
    }

    fn batch_source(&self, subject: Subject, end_seconds: i64) -> Option<Arc<dyn BatchSource>> {
        if let Some(source) = self.sources.get(&subject) {
            return Some(Arc::clone(source));
        }
        match (self.config.data_mode, self.tracking_start(subject, end_seconds)) {
            (DataMode::Synthetic, Some(tracking_start)) => {
                let seed = self.config.random_seed.unwrap_or(DEFAULT_SYNTHETIC_SEED);
                let synthetic = &self.config.synthetic;
                Some(Arc::new(
                    SyntheticSource::new(subject, tracking_start, seed)
                        .with_age_at_tracking_start(self.config.age_at_tracking_start(subject))
                        .with_history_days(self.config.history_days)
                        .with_failure_rate(synthetic.failure_rate)
                        .with_readings_per_day(synthetic.readings_per_day),
                ))
            }
            _ => None,
        }
    }

    async fn windowed_series(
        &self,
        subject: Subject,
        resolver: &Arc<FieldResolver>,
        end_seconds: i64,
    ) -> Option<Result<TimeSeries>> {
        let source = self.batch_source(subject, end_seconds)?;
        Some(
            self.aggregator
                .collect_tracked(
                    source,
                    Arc::clone(resolver),
                    self.config.history_days,
                    end_seconds,
                    self.tracking_start(subject, end_seconds),
                )
                .await,
        )
    }

    async fn daily_series(
        &self,
        subject: Subject,
        resolver: &FieldResolver,
    ) -> Option<Result<TimeSeries>> {
        let source = self.daily_sources.get(&subject)?;
        Some(self.aggregator.collect_daily(source.as_ref(), resolver).await)
    }

    /// Run all three models for one metric
    pub async fn forecast_metric(
        &self,
        metric: Metric,
        horizon: usize,
        end_seconds: i64,
    ) -> Result<ModelForecasts> {
        let subject = metric.subject();
        let resolver = Arc::new(subject.resolver(metric));

        let windowed = self.windowed_series(subject, &resolver, end_seconds).await;
        let daily = self.daily_series(subject, &resolver).await;

        // Regression prefers the windowed path, growth and seasonal the daily one
        let (trend_series, curve_series) = match (windowed, daily) {
            (Some(windowed), Some(Ok(daily))) => (windowed, Ok(daily)),
            (Some(windowed), Some(Err(err))) => match windowed {
                Ok(series) => {
                    warn!(
                        metric = %metric,
                        error = %err,
                        "daily batch unavailable, growth and seasonal use the windowed series"
                    );
                    (Ok(series.clone()), Ok(series))
                }
                Err(windowed_err) => (Err(windowed_err), Err(err)),
            },
            (Some(windowed), None) => {
                let series = windowed?;
                (Ok(series.clone()), Ok(series))
            }
            (None, Some(daily)) => {
                let series = daily?;
                (Ok(series.clone()), Ok(series))
            }
            (None, None) => {
                return Err(ForecastError::Source(format!(
                    "no data source configured for subject '{}'",
                    subject
                )))
            }
        };

        let min_points = self.config.min_points;
        let linear = LinearTrendFitter::new(min_points.regression);
        let growth = SaturationGrowthFitter::new(metric)
            .with_min_points(min_points.growth)
            .with_age_at_tracking_start(self.config.age_at_tracking_start(subject))
            .with_seed(self.config.random_seed);
        let seasonal = SeasonalForecaster::new(self.config.seasonal_period, min_points.seasonal)?;

        let forecasts = ModelForecasts {
            linear: run_model(&linear, &trend_series, horizon, metric),
            growth: run_model(&growth, &curve_series, horizon, metric),
            seasonal: run_model(&seasonal, &curve_series, horizon, metric),
        };

        info!(
            metric = %metric,
            linear = forecasts.linear.is_ok(),
            growth = forecasts.growth.is_ok(),
            seasonal = forecasts.seasonal.is_ok(),
            "metric forecast complete"
        );
        Ok(forecasts)
    }

    /// Forecast every metric of a subject
    pub async fn forecast_subject(
        &self,
        subject: Subject,
        horizon: usize,
        end_seconds: i64,
    ) -> SubjectForecast {
        let mut metrics = Vec::with_capacity(subject.metrics().len());
        for &metric in subject.metrics() {
            let outcome = self.forecast_metric(metric, horizon, end_seconds).await;
            if let Err(err) = &outcome {
                warn!(subject = %subject, metric = %metric, error = %err, "metric pipeline failed");
            }
            metrics.push(MetricForecast { metric, outcome });
        }
        SubjectForecast { subject, metrics }
    }
}

fn run_model(
    model: &dyn ForecastModel,
    series: &Result<TimeSeries>,
    horizon: usize,
    metric: Metric,
) -> Result<ForecastResult> {
    let series = match series {
        Ok(series) => series,
        Err(err) => {
            return Err(ForecastError::Source(format!(
                "series unavailable for {}: {}",
                model.name(),
                err
            )))
        }
    };

    let result = model.forecast(series, horizon);
    if let Err(err) = &result {
        warn!(
            metric = %metric,
            model = model.name(),
            points = series.len(),
            data_shortage = err.is_data_shortage(),
            error = %err,
            "model failed"
        );
    }
    result
}
