//! Engine configuration

use crate::domain::Subject;
use crate::error::{ForecastError, Result};
use crate::models::seasonal;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Where the facade takes its data from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataMode {
    /// Injected sources only
    #[default]
    Live,
    /// Built-in synthetic source for subjects without an injected one
    Synthetic,
}

/// Minimum series length per forecasting path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MinPoints {
    #[serde(default = "default_regression_min")]
    pub regression: usize,
    #[serde(default = "default_growth_min")]
    pub growth: usize,
    #[serde(default = "default_seasonal_min")]
    pub seasonal: usize,
}

impl Default for MinPoints {
    fn default() -> Self {
        Self {
            regression: default_regression_min(),
            growth: default_growth_min(),
            seasonal: default_seasonal_min(),
        }
    }
}

/// Where a subject sits on its own timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct SubjectSettings {
    /// Unix seconds of day index 0; the oldest requested window when absent
    #[serde(default)]
    pub tracking_start_seconds: Option<i64>,
    /// Age of the subject in days at tracking start
    #[serde(default)]
    pub age_at_tracking_start_days: u32,
}

/// Knobs of the built-in synthetic source
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SyntheticSettings {
    /// Probability that a window request fails outright
    #[serde(default)]
    pub failure_rate: f64,
    #[serde(default = "default_readings_per_day")]
    pub readings_per_day: usize,
}

impl Default for SyntheticSettings {
    fn default() -> Self {
        Self {
            failure_rate: 0.0,
            readings_per_day: default_readings_per_day(),
        }
    }
}

/// Engine settings.
///
/// Loaded in order, later sources overriding earlier:
/// 1. `config/growth.toml` (optional)
/// 2. Environment variables prefixed with `GROWTH__`, nested keys separated
///    by `__` (e.g. `GROWTH__MIN_POINTS__SEASONAL=21`,
///    `GROWTH__AQUATIC__AGE_AT_TRACKING_START_DAYS=60`)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub data_mode: DataMode,
    /// Trailing days requested by the aggregator
    #[serde(default = "default_history_days")]
    pub history_days: u32,
    /// Budget for a single day-window request
    #[serde(default = "default_window_timeout_ms")]
    pub window_timeout_ms: u64,
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    /// Seed for the saturation search; entropy when absent
    #[serde(default)]
    pub random_seed: Option<u64>,
    #[serde(default = "default_seasonal_period")]
    pub seasonal_period: usize,
    #[serde(default)]
    pub min_points: MinPoints,
    #[serde(default)]
    pub aquatic: SubjectSettings,
    #[serde(default)]
    pub plant: SubjectSettings,
    #[serde(default)]
    pub synthetic: SyntheticSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_mode: DataMode::default(),
            history_days: default_history_days(),
            window_timeout_ms: default_window_timeout_ms(),
            max_concurrent_requests: default_max_concurrent_requests(),
            random_seed: None,
            seasonal_period: default_seasonal_period(),
            min_points: MinPoints::default(),
            aquatic: SubjectSettings::default(),
            plant: SubjectSettings::default(),
            synthetic: SyntheticSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Load from `config/growth.toml` and the environment
    pub fn load() -> Result<Self> {
        Self::load_from("config/growth")
    }

    /// Load from the given file (extension optional, may be absent) and the environment
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let name = path.as_ref().to_string_lossy().into_owned();
        let config = Config::builder()
            .add_source(File::with_name(&name).required(false))
            .add_source(
                Environment::with_prefix("GROWTH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: EngineConfig = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings no pipeline could run with
    pub fn validate(&self) -> Result<()> {
        if self.history_days == 0 {
            return Err(invalid("history_days must be positive"));
        }
        if self.window_timeout_ms == 0 {
            return Err(invalid("window_timeout_ms must be positive"));
        }
        if self.max_concurrent_requests == 0 {
            return Err(invalid("max_concurrent_requests must be positive"));
        }
        if self.seasonal_period < 2 {
            return Err(invalid("seasonal_period must be at least 2"));
        }
        if self.min_points.seasonal < seasonal::ABSOLUTE_MIN_POINTS {
            return Err(ForecastError::InvalidParameter(format!(
                "min_points.seasonal must be at least {}",
                seasonal::ABSOLUTE_MIN_POINTS
            )));
        }
        if !(0.0..=1.0).contains(&self.synthetic.failure_rate) {
            return Err(invalid("synthetic.failure_rate must lie in [0, 1]"));
        }
        if self.synthetic.readings_per_day == 0 {
            return Err(invalid("synthetic.readings_per_day must be positive"));
        }
        Ok(())
    }

    pub fn window_timeout(&self) -> Duration {
        Duration::from_millis(self.window_timeout_ms)
    }

    pub fn subject(&self, subject: Subject) -> &SubjectSettings {
        match subject {
            Subject::Aquatic => &self.aquatic,
            Subject::Plant => &self.plant,
        }
    }

    pub fn age_at_tracking_start(&self, subject: Subject) -> u32 {
        self.subject(subject).age_at_tracking_start_days
    }
}

fn invalid(message: &str) -> ForecastError {
    ForecastError::InvalidParameter(message.to_string())
}

fn default_history_days() -> u32 {
    30
}

fn default_window_timeout_ms() -> u64 {
    10_000
}

fn default_max_concurrent_requests() -> usize {
    8
}

fn default_readings_per_day() -> usize {
    4
}

fn default_seasonal_period() -> usize {
    seasonal::DEFAULT_PERIOD
}

fn default_regression_min() -> usize {
    5
}

fn default_growth_min() -> usize {
    10
}

fn default_seasonal_min() -> usize {
    seasonal::DEFAULT_MIN_POINTS
}
