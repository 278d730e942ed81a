use approx::assert_relative_eq;
use growth_forecast::data::{Measurement, TimeSeries};
use growth_forecast::domain::Metric;
use growth_forecast::models::seasonal::forecast_band;
use growth_forecast::models::{
    ForecastModel, LinearTrendFitter, ModelKind, SaturationGrowthFitter, SeasonalForecaster,
};
use growth_forecast::ForecastError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rstest::rstest;

fn plant_series(days: u32) -> TimeSeries {
    let measurements = (0..days)
        .map(|day| {
            let t = f64::from(day);
            Measurement::new(day, 40.0 * (1.0 - (-0.03 * (t + 10.0)).exp()))
                .with_covariate("temperature", 22.0 + (t * 0.9).sin())
                .with_covariate("humidity", 65.0)
                .with_covariate("light", 14_000.0)
        })
        .collect();
    TimeSeries::new(measurements).unwrap()
}

fn noisy_series(len: usize, seed: u64) -> TimeSeries {
    let mut rng = StdRng::seed_from_u64(seed);
    let values: Vec<f64> = (0..len)
        .map(|i| 20.0 + 0.3 * i as f64 + rng.gen_range(-1.5..1.5))
        .collect();
    TimeSeries::from_values(&values).unwrap()
}

#[test]
fn test_linear_fit_matches_textbook_ols() {
    let x = [1.0, 2.0, 3.0, 4.0, 5.0];
    let y = [2.0, 4.0, 5.0, 4.0, 5.0];
    let fit = LinearTrendFitter::fit(&x, &y).unwrap();
    assert_relative_eq!(fit.parameters.as_slice()[0], 0.6, epsilon = 1e-12);
    assert_relative_eq!(fit.parameters.as_slice()[1], 2.2, epsilon = 1e-12);
    assert_relative_eq!(fit.r_squared, 0.6, epsilon = 1e-12);
}

#[test]
fn test_linear_constant_y_has_zero_r_squared() {
    let fit = LinearTrendFitter::fit(&[0.0, 1.0, 2.0, 3.0], &[4.0, 4.0, 4.0, 4.0]).unwrap();
    assert_eq!(fit.r_squared, 0.0);
    assert_relative_eq!(fit.parameters.as_slice()[0], 0.0, epsilon = 1e-12);
}

#[rstest]
#[case(&[1.0, 2.0], &[1.0])]
#[case(&[1.0], &[1.0])]
#[case(&[2.0, 2.0, 2.0], &[1.0, 2.0, 3.0])]
fn test_linear_degenerate_inputs(#[case] x: &[f64], #[case] y: &[f64]) {
    assert!(matches!(
        LinearTrendFitter::fit(x, y),
        Err(ForecastError::DegenerateInput(_))
    ));
}

#[test]
fn test_linear_end_to_end_uses_day_indices() {
    let values: Vec<f64> = (0..20).map(|i| 10.0 + 0.5 * i as f64).collect();
    let series = TimeSeries::from_values(&values).unwrap();
    let fitter = LinearTrendFitter::default();

    let fit = fitter.fit_series(&series).unwrap();
    assert_relative_eq!(fit.parameters.as_slice()[0], 0.5, epsilon = 1e-9);
    assert_relative_eq!(fit.parameters.as_slice()[1], 10.0, epsilon = 1e-9);
    assert_relative_eq!(fit.r_squared, 1.0, epsilon = 1e-9);

    // Day 19 + 5 = day 24
    let forecast = fitter.forecast(&series, 5).unwrap();
    assert_eq!(forecast.model, ModelKind::LinearTrend);
    assert_eq!(forecast.daily_predictions.len(), 5);
    assert_relative_eq!(forecast.current_value, 19.5, epsilon = 1e-9);
    assert_relative_eq!(forecast.predicted_value, 22.0, epsilon = 1e-9);
    assert_relative_eq!(forecast.expected_growth, 2.5, epsilon = 1e-9);
}

#[test]
fn test_saturation_fit_is_deterministic_under_seed() {
    let series = plant_series(20);
    let fitter = SaturationGrowthFitter::new(Metric::Height);

    let first = fitter.fit_seeded(&series, 11).unwrap();
    let second = fitter.fit_seeded(&series, 11).unwrap();
    assert_eq!(first.parameters, second.parameters);
    assert_eq!(first.r_squared, second.r_squared);
}

#[test]
fn test_saturation_curve_stays_within_asymptote() {
    let series = plant_series(20);
    let fitter = SaturationGrowthFitter::new(Metric::Height);
    let fit = fitter.fit_seeded(&series, 5).unwrap();

    let asymptote = fit.parameters.as_slice()[0];
    assert!(asymptote >= 15.0);
    assert!((0.0..=1.0).contains(&fit.r_squared));
    assert!(fit.error >= 0.0);

    for measurement in series.measurements() {
        let value = fitter
            .predict(
                &fit.parameters,
                f64::from(measurement.day_index()),
                measurement.covariates(),
            )
            .unwrap();
        assert!(value > 0.0);
        assert!(value <= asymptote);
    }
}

#[test]
fn test_saturation_forecast_reports_r_squared() {
    let series = plant_series(20);
    let model = SaturationGrowthFitter::new(Metric::Height).with_seed(Some(3));
    let forecast = model.forecast(&series, 10).unwrap();

    assert_eq!(forecast.model, ModelKind::SaturationGrowth);
    assert_eq!(forecast.daily_predictions.len(), 10);
    assert!(forecast.daily_predictions.iter().all(|v| v.is_finite() && *v > 0.0));
    let r_squared = forecast.diagnostics.r_squared.unwrap();
    assert!((0.0..=1.0).contains(&r_squared));
}

#[test]
fn test_saturation_requires_domain_minimum() {
    let series = plant_series(9);
    let result = SaturationGrowthFitter::new(Metric::Height)
        .with_seed(Some(1))
        .forecast(&series, 5);
    assert!(matches!(
        result,
        Err(ForecastError::InsufficientData {
            required: 10,
            actual: 9
        })
    ));
}

#[test]
fn test_seasonal_square_wave_is_detected() {
    let pattern = [12.0, 12.0, 12.0, 12.0, 8.0, 8.0, 8.0];
    let values: Vec<f64> = pattern.iter().chain(pattern.iter()).copied().collect();
    let series = TimeSeries::from_values(&values).unwrap();

    let forecast = SeasonalForecaster::default().forecast(&series, 7).unwrap();
    let diagnostics = forecast.diagnostics.seasonal.unwrap();

    assert_eq!(diagnostics.seasonal_period, 7);
    assert!(diagnostics.seasonal_strength > 0.3);
    assert!(!diagnostics.is_stationary);
    assert_eq!(diagnostics.differencing_order, 1);
    assert!(diagnostics.seasonal_differencing);
}

#[rstest]
#[case(1)]
#[case(14)]
#[case(90)]
#[case(400)]
fn test_seasonal_predictions_stay_in_band(#[case] horizon: usize) {
    let series = noisy_series(30, 99);
    let last = *series.values().last().unwrap();
    let forecast = SeasonalForecaster::default().forecast(&series, horizon).unwrap();

    assert_eq!(forecast.daily_predictions.len(), horizon);
    assert_eq!(forecast.horizon_days, horizon);
    for (i, value) in forecast.daily_predictions.iter().enumerate() {
        let (lower, upper) = forecast_band(last, i + 1);
        assert!(value.is_finite());
        assert!(*value >= lower - 1e-9 && *value <= upper + 1e-9);
    }
    assert!((0.5..=0.95).contains(&forecast.confidence));
}

#[test]
fn test_seasonal_is_deterministic() {
    let series = noisy_series(21, 4);
    let model = SeasonalForecaster::new(7, 10).unwrap();
    let first = model.forecast(&series, 10).unwrap();
    let second = model.forecast(&series, 10).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_zero_horizon_is_rejected() {
    let series = noisy_series(20, 1);
    assert!(matches!(
        LinearTrendFitter::default().forecast(&series, 0),
        Err(ForecastError::InvalidParameter(_))
    ));
    assert!(matches!(
        SeasonalForecaster::default().forecast(&series, 0),
        Err(ForecastError::InvalidParameter(_))
    ));
}
