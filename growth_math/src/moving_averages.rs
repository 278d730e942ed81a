//! Moving average calculation implementations
//!
//! A rolling accumulator plus batch helpers over whole series.

use crate::{MathError, Result};
use std::collections::VecDeque;

/// Rolling simple moving average over the last `period` values
#[derive(Debug, Clone)]
pub struct SimpleMovingAverage {
    period: usize,
    window: VecDeque<f64>,
    running_sum: f64,
}

impl SimpleMovingAverage {
    /// Fails on a zero period
    pub fn new(period: usize) -> Result<Self> {
        if period == 0 {
            return Err(MathError::InvalidInput(
                "moving average period must be positive".to_string(),
            ));
        }

        Ok(Self {
            period,
            window: VecDeque::with_capacity(period + 1),
            running_sum: 0.0,
        })
    }

    /// Push a value, evicting the oldest once the window is full
    pub fn update(&mut self, value: f64) {
        self.window.push_back(value);
        self.running_sum += value;
        if self.window.len() > self.period {
            if let Some(evicted) = self.window.pop_front() {
                self.running_sum -= evicted;
            }
        }
    }

    /// Average of the window; `None` until `period` values have been seen
    pub fn value(&self) -> Option<f64> {
        (self.window.len() == self.period).then(|| self.running_sum / self.period as f64)
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

/// Moving average of every full window, oldest first.
///
/// The output has `values.len() - window + 1` entries; it is empty when the
/// series is shorter than the window.
pub fn moving_average(values: &[f64], window: usize) -> Result<Vec<f64>> {
    let mut sma = SimpleMovingAverage::new(window)?;
    let mut averages = Vec::with_capacity(values.len().saturating_sub(window) + 1);
    for &value in values {
        sma.update(value);
        if let Some(average) = sma.value() {
            averages.push(average);
        }
    }
    Ok(averages)
}

/// Mean of the last `window` values (or of all values when fewer exist)
pub fn trailing_mean(values: &[f64], window: usize) -> Option<f64> {
    if values.is_empty() || window == 0 {
        return None;
    }
    let tail = &values[values.len().saturating_sub(window)..];
    Some(tail.iter().sum::<f64>() / tail.len() as f64)
}
