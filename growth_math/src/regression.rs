//! Ordinary least squares line fitting
//!
//! A batch counterpart of a rolling linear regression: the whole `(x, y)`
//! sample is fitted at once and the result carries the coefficient of
//! determination alongside slope and intercept.

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// Below this magnitude the normal-equation denominator is treated as zero
pub const DEGENERACY_TOLERANCE: f64 = 1e-10;

/// Fitted straight line `y = slope * x + intercept`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    slope: f64,
    intercept: f64,
    r_squared: f64,
    mean_squared_error: f64,
    points: usize,
}

impl LinearRegression {
    /// Fit a line through the paired samples.
    ///
    /// `slope = (nΣxy − ΣxΣy) / (nΣx² − (Σx)²)` and
    /// `intercept = (Σy − slope·Σx) / n`.
    ///
    /// # Errors
    ///
    /// Returns [`MathError::DegenerateInput`] when the slices differ in
    /// length, hold fewer than two points, or when every `x` is (nearly)
    /// the same value. Non-finite samples are rejected as
    /// [`MathError::InvalidInput`].
    pub fn fit(x: &[f64], y: &[f64]) -> Result<Self> {
        if x.len() != y.len() {
            return Err(MathError::DegenerateInput(format!(
                "x has {} values but y has {}",
                x.len(),
                y.len()
            )));
        }
        if x.len() < 2 {
            return Err(MathError::DegenerateInput(format!(
                "at least 2 points are needed for a line, got {}",
                x.len()
            )));
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(MathError::InvalidInput(
                "regression samples must be finite".to_string(),
            ));
        }

        let n = x.len() as f64;
        let (mut sum_x, mut sum_y, mut sum_xy, mut sum_xx) = (0.0, 0.0, 0.0, 0.0);
        for (&xi, &yi) in x.iter().zip(y) {
            sum_x += xi;
            sum_y += yi;
            sum_xy += xi * yi;
            sum_xx += xi * xi;
        }

        let denominator = n * sum_xx - sum_x * sum_x;
        if denominator.abs() < DEGENERACY_TOLERANCE {
            return Err(MathError::DegenerateInput(
                "x values are collinear; slope is undefined".to_string(),
            ));
        }

        let slope = (n * sum_xy - sum_x * sum_y) / denominator;
        let intercept = (sum_y - slope * sum_x) / n;

        let y_mean = sum_y / n;
        let mut ss_total = 0.0;
        let mut ss_residual = 0.0;
        for (&xi, &yi) in x.iter().zip(y) {
            let predicted = slope * xi + intercept;
            ss_total += (yi - y_mean).powi(2);
            ss_residual += (yi - predicted).powi(2);
        }

        // Constant y has no variance to explain.
        let r_squared = if ss_total < DEGENERACY_TOLERANCE {
            0.0
        } else {
            (1.0 - ss_residual / ss_total).clamp(0.0, 1.0)
        };

        Ok(Self {
            slope,
            intercept,
            r_squared,
            mean_squared_error: ss_residual / n,
            points: x.len(),
        })
    }

    /// Fit against the positions `0..y.len()`
    pub fn fit_positions(y: &[f64]) -> Result<Self> {
        let x: Vec<f64> = (0..y.len()).map(|i| i as f64).collect();
        Self::fit(&x, y)
    }

    /// Evaluate the line at `x`
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    pub fn slope(&self) -> f64 {
        self.slope
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Coefficient of determination, always within `[0, 1]`
    pub fn r_squared(&self) -> f64 {
        self.r_squared
    }

    /// Mean of the squared residuals over the fitted sample
    pub fn mean_squared_error(&self) -> f64 {
        self.mean_squared_error
    }

    /// Number of points the line was fitted on
    pub fn points(&self) -> usize {
        self.points
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_perfect_line() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [1.0, 3.0, 5.0, 7.0];
        let fit = LinearRegression::fit(&x, &y).unwrap();

        assert_relative_eq!(fit.slope(), 2.0, epsilon = 1e-12);
        assert_relative_eq!(fit.intercept(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(fit.r_squared(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(fit.predict(10.0), 21.0, epsilon = 1e-9);
        assert_eq!(fit.points(), 4);
    }

    #[test]
    fn test_matches_textbook_formula_on_noisy_data() {
        let x = [1.0, 2.0, 4.0, 5.0, 7.0];
        let y = [2.1, 3.9, 8.2, 9.8, 14.5];

        let n = x.len() as f64;
        let sx: f64 = x.iter().sum();
        let sy: f64 = y.iter().sum();
        let sxy: f64 = x.iter().zip(&y).map(|(a, b)| a * b).sum();
        let sxx: f64 = x.iter().map(|a| a * a).sum();
        let slope = (n * sxy - sx * sy) / (n * sxx - sx * sx);
        let intercept = (sy - slope * sx) / n;

        let fit = LinearRegression::fit(&x, &y).unwrap();
        assert_relative_eq!(fit.slope(), slope, epsilon = 1e-12);
        assert_relative_eq!(fit.intercept(), intercept, epsilon = 1e-12);
        assert!(fit.r_squared() > 0.9 && fit.r_squared() <= 1.0);
    }

    #[test]
    fn test_constant_y_has_zero_r_squared() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0];
        let y = [0.1; 5];
        let fit = LinearRegression::fit(&x, &y).unwrap();

        assert_eq!(fit.r_squared(), 0.0);
        assert_relative_eq!(fit.slope(), 0.0, epsilon = 1e-12);
    }

    #[rstest]
    #[case(vec![1.0, 1.0, 1.0], vec![1.0, 2.0, 3.0])]
    #[case(vec![1.0], vec![1.0])]
    #[case(vec![1.0, 2.0], vec![1.0])]
    #[case(vec![], vec![])]
    fn test_degenerate_inputs(#[case] x: Vec<f64>, #[case] y: Vec<f64>) {
        let result = LinearRegression::fit(&x, &y);
        assert!(matches!(result, Err(MathError::DegenerateInput(_))));
    }

    #[test]
    fn test_non_finite_input_rejected() {
        let result = LinearRegression::fit(&[0.0, 1.0, 2.0], &[1.0, f64::NAN, 2.0]);
        assert!(matches!(result, Err(MathError::InvalidInput(_))));
    }

    #[test]
    fn test_fit_positions() {
        let fit = LinearRegression::fit_positions(&[5.0, 4.0, 3.0]).unwrap();
        assert_relative_eq!(fit.slope(), -1.0, epsilon = 1e-12);
        assert_relative_eq!(fit.intercept(), 5.0, epsilon = 1e-12);
    }
}
