//! Derives percentage, elapsed time, rate and ETA from a tracker snapshot.
//!
//! Every function is pure: the caller passes `now` explicitly.

use crate::core::models::{ProgressMetrics, ProgressState, ProgressStatus};
use chrono::{DateTime, Utc};

pub const EPSILON: f64 = 0.0001;

/// Below this much running time the sample is too short for a rate
const MIN_RATE_SAMPLE_MS: i64 = 1000;
const MS_PER_MINUTE: f64 = 60_000.0;

/// JS-style rounding: halves go towards positive infinity.
pub(crate) fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

pub fn percentage(current: i64, total: Option<i64>) -> u8 {
    let total = match total {
        Some(total) if total != 0 => total,
        _ => return 0,
    };
    let percent = round_half_up(current as f64 / total as f64 * 100.0);
    percent.clamp(0.0, 100.0) as u8
}

/// Milliseconds spent running. Only a running tracker accrues live time;
/// paused and finished trackers report the frozen buffer.
pub fn elapsed(state: &ProgressState, now: DateTime<Utc>) -> i64 {
    match state.status {
        ProgressStatus::Initial => 0,
        ProgressStatus::Paused | ProgressStatus::Finished => state.pause_buffer,
        ProgressStatus::Running => match state.started_at {
            Some(started_at) => {
                state.pause_buffer + (now - started_at).num_milliseconds().max(0)
            }
            None => state.pause_buffer,
        },
    }
}

/// Items per minute since tracking started, or `None` while the sample is too short.
pub fn rate(state: &ProgressState, now: DateTime<Utc>) -> Option<f64> {
    let elapsed = elapsed(state, now);
    if elapsed < MIN_RATE_SAMPLE_MS {
        return None;
    }

    let items_processed = (state.current - state.start_current) as f64;
    let elapsed_minutes = elapsed as f64 / MS_PER_MINUTE;
    if elapsed_minutes < EPSILON {
        return None;
    }

    Some(items_processed / elapsed_minutes)
}

/// Milliseconds until `total` is reached at the given rate.
pub fn eta(state: &ProgressState, rate: Option<f64>) -> Option<f64> {
    let total = state.total?;
    let rate = rate.filter(|rate| *rate >= EPSILON)?;

    let remaining = total - state.current;
    if remaining <= 0 {
        return Some(0.0);
    }

    // The floor keeps vanishing rates finite
    let rate_per_ms = rate / MS_PER_MINUTE;
    Some(remaining as f64 / rate_per_ms.max(EPSILON))
}

pub fn metrics(state: &ProgressState, now: DateTime<Utc>) -> ProgressMetrics {
    let rate = rate(state, now);
    ProgressMetrics {
        percentage: percentage(state.current, state.total),
        rate,
        eta: eta(state, rate),
        elapsed: elapsed(state, now),
    }
}
