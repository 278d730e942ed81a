//! Utility functions for the growth_forecast crate

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Length of one aggregation window
pub const SECONDS_PER_DAY: i64 = 86_400;

/// One contiguous day-long request window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayWindow {
    /// Whole days since the series origin, 0 = first tracked day
    pub day_index: u32,
    /// Inclusive start, unix seconds
    pub start_seconds: i64,
    /// Exclusive end, unix seconds
    pub end_seconds: i64,
}

/// Partition the `days` days ending at `end_seconds` into one-day windows, oldest first
pub fn day_windows(end_seconds: i64, days: u32) -> Vec<DayWindow> {
    let span_start = end_seconds - i64::from(days) * SECONDS_PER_DAY;
    (0..days)
        .map(|day_index| {
            let start_seconds = span_start + i64::from(day_index) * SECONDS_PER_DAY;
            DayWindow {
                day_index,
                start_seconds,
                end_seconds: start_seconds + SECONDS_PER_DAY,
            }
        })
        .collect()
}

/// Trailing windows numbered by whole days since `tracking_start_seconds`.
///
/// Without a tracking start the oldest window is day 0. Windows that begin
/// before the tracking start are dropped.
pub fn tracked_day_windows(
    end_seconds: i64,
    days: u32,
    tracking_start_seconds: Option<i64>,
) -> Vec<DayWindow> {
    let windows = day_windows(end_seconds, days);
    let Some(origin) = tracking_start_seconds else {
        return windows;
    };
    windows
        .into_iter()
        .filter_map(|window| {
            let elapsed = window.start_seconds - origin;
            if elapsed < 0 {
                return None;
            }
            let day_index = u32::try_from(elapsed / SECONDS_PER_DAY).ok()?;
            Some(DayWindow { day_index, ..window })
        })
        .collect()
}

/// Current time as unix seconds
pub fn now_seconds() -> i64 {
    Utc::now().timestamp()
}

/// Fractional days elapsed from `origin_seconds` to `timestamp_seconds`
pub fn days_since(origin_seconds: i64, timestamp_seconds: i64) -> f64 {
    (timestamp_seconds - origin_seconds) as f64 / SECONDS_PER_DAY as f64
}
