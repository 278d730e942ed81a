//! Asymptotic growth curves driven by environmental covariates
//!
//! The curve is `A · (1 − e^(−k(t − t0)))`: Von Bertalanffy for the aquatic
//! subject, exponential saturation for the plant. The rate `k` is not a
//! constant; it is `Σ |β_i| · effect_i` over the subject's covariates,
//! clamped into the subject's plausible band. Parameters are laid out as
//! `[A, t0, β_0 .. β_k]`.
//!
//! The curve lives on the age axis: an observation on day index `d` sits at
//! `t = d + age_at_tracking_start`, and literature anchors sit at their age
//! in days. `t0` is therefore an age offset.
//!
//! The loss surface is non-smooth (absolute values and clamps), so the fit
//! is a multi-restart randomized local search with a cooling step size
//! rather than a gradient method. The random source is always passed in.

use crate::data::{ReferenceCalibrationPoint, TimeSeries};
use crate::domain::{Metric, Subject};
use crate::error::{ForecastError, Result};
use crate::metrics::{forecast_accuracy, r_squared};
use crate::models::{
    check_horizon, FitResult, ForecastDiagnostics, ForecastModel, ForecastResult, ModelKind,
    ModelParameters,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use growth_math::LinearRegression;
use rand_distr::{Distribution, Uniform};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Independent restarts of the local search
pub const RESTARTS: usize = 5;
/// Perturbation rounds per restart
pub const ITERATIONS: usize = 150;
/// Initial perturbation size relative to each parameter
pub const STEP_SCALE: f64 = 0.08;
/// Multiplicative spread applied to the initial guess on restarts after the first
pub const RESTART_SPREAD: (f64, f64) = (0.3, 1.7);
/// Smallest admissible asymptote
pub const MIN_ASYMPTOTE: f64 = 15.0;
/// Admissible range of the origin offset `t0`, in days of age
pub const ORIGIN_OFFSET_LIMIT: f64 = 15.0;
/// Loss weight of a calibration point relative to an observed point
pub const CALIBRATION_WEIGHT: f64 = 3.0;
/// Exponents beyond this magnitude are not passed to `exp`
pub const EXPONENT_LIMIT: f64 = 50.0;
/// Lower bound of every curve value
pub const VALUE_FLOOR: f64 = 0.01;
/// Minimum points for the growth path
pub const DEFAULT_MIN_POINTS: usize = 10;
/// Trailing days whose covariates drive the forecast
pub const FORECAST_PROFILE_WINDOW: usize = 7;

const ASYMPTOTE: usize = 0;
const ORIGIN: usize = 1;
const FIRST_WEIGHT: usize = 2;

/// A point the loss is evaluated against, with its covariate effects precomputed
#[derive(Debug, Clone)]
struct Target {
    t: f64,
    value: f64,
    effects: Vec<f64>,
}

/// Evaluate `A · (1 − e^(−k(t − t0)))` with overflow guards.
///
/// The result always lies within `[VALUE_FLOOR, A]`.
pub fn saturation_curve(asymptote: f64, origin: f64, rate: f64, t: f64) -> f64 {
    let ceiling = asymptote.max(VALUE_FLOOR);
    let exponent = -rate * (t - origin);
    if exponent > EXPONENT_LIMIT {
        return VALUE_FLOOR;
    }
    if exponent < -EXPONENT_LIMIT {
        return ceiling;
    }
    let value = asymptote * (1.0 - exponent.exp());
    if value.is_nan() {
        return value;
    }
    value.clamp(VALUE_FLOOR, ceiling)
}

/// Fits covariate-driven saturation curves for one metric
#[derive(Debug, Clone)]
pub struct SaturationGrowthFitter {
    /// Name of the model
    name: String,
    subject: Subject,
    metric: Metric,
    /// Literature anchors, in days of age
    calibration: Vec<ReferenceCalibrationPoint>,
    /// Age in days of the subject on day index 0
    age_at_tracking_start_days: u32,
    min_points: usize,
    /// Seed used by the `ForecastModel` path; `None` draws entropy
    seed: Option<u64>,
}

impl SaturationGrowthFitter {
    /// Create a fitter with the metric's literature calibration points
    pub fn new(metric: Metric) -> Self {
        let subject = metric.subject();
        let shape = match subject.curve_shape() {
            crate::domain::CurveShape::VonBertalanffy => "Von Bertalanffy",
            crate::domain::CurveShape::ExponentialSaturation => "Exponential Saturation",
        };
        Self {
            name: format!("{} ({})", shape, metric),
            subject,
            metric,
            calibration: metric.calibration_points(),
            age_at_tracking_start_days: 0,
            min_points: DEFAULT_MIN_POINTS,
            seed: None,
        }
    }

    pub fn with_calibration(mut self, calibration: Vec<ReferenceCalibrationPoint>) -> Self {
        self.calibration = calibration;
        self
    }

    pub fn with_age_at_tracking_start(mut self, days: u32) -> Self {
        self.age_at_tracking_start_days = days;
        self
    }

    pub fn with_min_points(mut self, min_points: usize) -> Self {
        self.min_points = min_points.max(2);
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    fn parameter_count(&self) -> usize {
        FIRST_WEIGHT + self.subject.covariates().len()
    }

    /// Growth rate `k` for a set of normalized covariate effects
    fn rate_from_effects(&self, params: &[f64], effects: &[f64]) -> f64 {
        let (low, high) = self.subject.growth_rate_band();
        let rate: f64 = params[FIRST_WEIGHT..]
            .iter()
            .zip(effects)
            .map(|(beta, effect)| beta.abs() * effect)
            .sum();
        if rate.is_nan() {
            return rate;
        }
        rate.clamp(low, high)
    }

    /// Growth rate `k` under the given covariates, clamped into the subject's band
    pub fn growth_rate(
        &self,
        params: &ModelParameters,
        covariates: &BTreeMap<String, f64>,
    ) -> Result<f64> {
        params.expect_len(self.parameter_count(), &self.name)?;
        Ok(self.rate_from_effects(params.as_slice(), &self.subject.effects(covariates)))
    }

    /// Evaluate the fitted curve on day index `day` under the given covariates
    pub fn predict(
        &self,
        params: &ModelParameters,
        day: f64,
        covariates: &BTreeMap<String, f64>,
    ) -> Result<f64> {
        let rate = self.growth_rate(params, covariates)?;
        let p = params.as_slice();
        Ok(saturation_curve(p[ASYMPTOTE], p[ORIGIN], rate, self.age_of(day)))
    }

    fn age_of(&self, day: f64) -> f64 {
        day + f64::from(self.age_at_tracking_start_days)
    }

    fn evaluate_at(&self, params: &[f64], target: &Target) -> f64 {
        let rate = self.rate_from_effects(params, &target.effects);
        saturation_curve(params[ASYMPTOTE], params[ORIGIN], rate, target.t)
    }

    fn observed_targets(&self, series: &TimeSeries) -> Vec<Target> {
        series
            .measurements()
            .iter()
            .map(|m| Target {
                t: self.age_of(f64::from(m.day_index())),
                value: m.value(),
                effects: self.subject.effects(m.covariates()),
            })
            .collect()
    }

    /// Calibration points at their age under the neutral profile
    fn calibration_targets(&self) -> Vec<Target> {
        let effects = self.subject.effects(&self.subject.neutral_profile());
        self.calibration
            .iter()
            .filter(|point| point.value.is_finite() && point.value > 0.0)
            .map(|point| Target {
                t: f64::from(point.age_in_days),
                value: point.value,
                effects: effects.clone(),
            })
            .collect()
    }

    /// Weighted mean squared error; `None` when any prediction is non-finite
    fn loss(&self, params: &[f64], observed: &[Target], calibration: &[Target]) -> Option<f64> {
        let mut observed_error = 0.0;
        for target in observed {
            let predicted = self.evaluate_at(params, target);
            if !predicted.is_finite() {
                return None;
            }
            observed_error += (predicted - target.value).powi(2);
        }

        let mut calibration_error = 0.0;
        for target in calibration {
            let predicted = self.evaluate_at(params, target);
            if !predicted.is_finite() {
                return None;
            }
            calibration_error += (predicted - target.value).powi(2);
        }

        let count = observed.len() + calibration.len();
        if count == 0 {
            return None;
        }
        Some((observed_error + CALIBRATION_WEIGHT * calibration_error) / count as f64)
    }

    /// Starting point derived from the series and the calibration anchors.
    ///
    /// The asymptote starts at 1.5× the largest observed or anchored value.
    /// The rate comes from the straight-line slope of the observations over
    /// the remaining headroom `A − mean`, falling back to the geometric
    /// mid-point of the rate band when the series is flat or falling. The
    /// weights are set so the neutral profile yields that rate, and `t0` is
    /// solved from the first observation.
    pub fn initial_guess(&self, series: &TimeSeries) -> ModelParameters {
        let observed = self.observed_targets(series);
        let max_value = observed
            .iter()
            .map(|target| target.value)
            .chain(self.calibration_targets().iter().map(|target| target.value))
            .fold(0.0_f64, f64::max);
        let asymptote = (max_value * 1.5).max(MIN_ASYMPTOTE);

        let (low, high) = self.subject.growth_rate_band();
        let ages: Vec<f64> = observed.iter().map(|target| target.t).collect();
        let values: Vec<f64> = observed.iter().map(|target| target.value).collect();
        let mean_value = values.iter().sum::<f64>() / values.len().max(1) as f64;
        let rate = match LinearRegression::fit(&ages, &values) {
            Ok(line) if line.slope() > 0.0 && asymptote > mean_value => {
                line.slope() / (asymptote - mean_value)
            }
            _ => (low * high).sqrt(),
        }
        .clamp(low, high);

        let neutral_effects = self.subject.effects(&self.subject.neutral_profile());
        let effect_sum: f64 = neutral_effects.iter().sum();
        let weight = rate / effect_sum.max(1e-6);

        let origin = match observed.first() {
            Some(first) => {
                let ratio = (first.value / asymptote).min(0.99);
                first.t + (1.0 - ratio).ln() / rate
            }
            None => -1.0,
        };
        let origin = origin.clamp(-ORIGIN_OFFSET_LIMIT, ORIGIN_OFFSET_LIMIT);
        // a zero offset could never be perturbed away from
        let origin = if origin.abs() < 1.0 { -1.0 } else { origin };

        let mut params = vec![asymptote, origin];
        params.extend(std::iter::repeat(weight).take(neutral_effects.len()));
        ModelParameters::new(params)
    }

    /// Fit with an explicit random source, starting from [`Self::initial_guess`].
    ///
    /// # Errors
    ///
    /// Returns [`ForecastError::InsufficientData`] below the minimum point
    /// count. The search itself never fails; a poor optimum is reported
    /// through a low `r_squared`.
    pub fn fit_with_rng<R: Rng + ?Sized>(
        &self,
        series: &TimeSeries,
        rng: &mut R,
    ) -> Result<FitResult> {
        series.require(self.min_points)?;
        let initial = self.initial_guess(series);
        self.fit_from(series, &initial, rng)
    }

    /// Fit starting from a caller-supplied parameter vector.
    ///
    /// The first restart begins at `initial` once the plausibility clamps are
    /// applied; later restarts scale it by a random spread.
    ///
    /// # Errors
    ///
    /// Returns [`ForecastError::InsufficientData`] below the minimum point
    /// count and [`ForecastError::InvalidParameter`] when `initial` does not
    /// hold `2 + covariates` values.
    pub fn fit_from<R: Rng + ?Sized>(
        &self,
        series: &TimeSeries,
        initial: &ModelParameters,
        rng: &mut R,
    ) -> Result<FitResult> {
        series.require(self.min_points)?;
        initial.expect_len(self.parameter_count(), &self.name)?;

        let observed = self.observed_targets(series);
        let calibration = self.calibration_targets();
        let mut start = initial.as_slice().to_vec();
        clamp_plausible(&mut start);
        let spread = Uniform::new_inclusive(RESTART_SPREAD.0, RESTART_SPREAD.1);

        let mut best = start.clone();
        let mut best_loss = self
            .loss(&start, &observed, &calibration)
            .unwrap_or(f64::INFINITY);

        for restart in 0..RESTARTS {
            let mut current: Vec<f64> = if restart == 0 {
                start.clone()
            } else {
                start.iter().map(|p| p * spread.sample(rng)).collect()
            };
            clamp_plausible(&mut current);
            let mut current_loss = self
                .loss(&current, &observed, &calibration)
                .unwrap_or(f64::INFINITY);

            for iteration in 0..ITERATIONS {
                let cooling = 1.0 - iteration as f64 / ITERATIONS as f64;
                let mut candidate: Vec<f64> = current
                    .iter()
                    .map(|&p| {
                        let magnitude = STEP_SCALE * p.abs() * cooling;
                        if magnitude > 0.0 {
                            p + rng.gen_range(-magnitude..=magnitude)
                        } else {
                            p
                        }
                    })
                    .collect();
                clamp_plausible(&mut candidate);

                let Some(loss) = self.loss(&candidate, &observed, &calibration) else {
                    continue;
                };
                if loss < current_loss {
                    current = candidate;
                    current_loss = loss;
                }
            }

            debug!(restart, loss = current_loss, metric = %self.metric, "restart finished");
            if current_loss < best_loss {
                best = current;
                best_loss = current_loss;
            }
        }

        let fitted: Vec<f64> = observed.iter().map(|t| self.evaluate_at(&best, t)).collect();
        let actual: Vec<f64> = observed.iter().map(|t| t.value).collect();
        let r_squared = r_squared(&fitted, &actual);
        let error = fitted
            .iter()
            .zip(&actual)
            .map(|(f, a)| (f - a).powi(2))
            .sum::<f64>()
            / actual.len() as f64;

        info!(
            metric = %self.metric,
            loss = best_loss,
            r_squared,
            asymptote = best[ASYMPTOTE],
            "saturation fit finished"
        );

        Ok(FitResult {
            parameters: ModelParameters::new(best),
            r_squared,
            error,
        })
    }

    /// Fit with a deterministic generator seeded from `seed`
    pub fn fit_seeded(&self, series: &TimeSeries, seed: u64) -> Result<FitResult> {
        let mut rng = StdRng::seed_from_u64(seed);
        self.fit_with_rng(series, &mut rng)
    }

    fn fit(&self, series: &TimeSeries) -> Result<FitResult> {
        match self.seed {
            Some(seed) => self.fit_seeded(series, seed),
            None => self.fit_with_rng(series, &mut StdRng::from_entropy()),
        }
    }
}

/// Keep the asymptote and origin offset biologically plausible
fn clamp_plausible(params: &mut [f64]) {
    params[ASYMPTOTE] = params[ASYMPTOTE].max(MIN_ASYMPTOTE);
    params[ORIGIN] = params[ORIGIN].clamp(-ORIGIN_OFFSET_LIMIT, ORIGIN_OFFSET_LIMIT);
}

impl ForecastModel for SaturationGrowthFitter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ModelKind {
        ModelKind::SaturationGrowth
    }

    fn forecast(&self, series: &TimeSeries, horizon: usize) -> Result<ForecastResult> {
        check_horizon(horizon)?;
        let fit = self.fit(series)?;

        let last = series.last().ok_or(ForecastError::InsufficientData {
            required: self.min_points,
            actual: 0,
        })?;
        let mut profile = series.recent_covariates(FORECAST_PROFILE_WINDOW);
        if profile.is_empty() {
            profile = self.subject.neutral_profile();
        }

        let last_day = f64::from(last.day_index());
        let daily_predictions = (1..=horizon)
            .map(|step| self.predict(&fit.parameters, last_day + step as f64, &profile))
            .collect::<Result<Vec<f64>>>()?;

        let fitted = series
            .measurements()
            .iter()
            .map(|m| self.predict(&fit.parameters, f64::from(m.day_index()), m.covariates()))
            .collect::<Result<Vec<f64>>>()?;

        let mut diagnostics = ForecastDiagnostics::new(series.len());
        diagnostics.r_squared = Some(fit.r_squared);
        diagnostics.in_sample = Some(forecast_accuracy(&fitted, &series.values())?);

        ForecastResult::new(
            ModelKind::SaturationGrowth,
            last.value(),
            daily_predictions,
            fit.r_squared,
            diagnostics,
        )
    }
}
