// src/engine/poll.rs

//! Adaptive polling interval.
//!
//! Polling too often wastes CPU on busy-waiting; polling too rarely delays
//! spawning new workers after a completion. [`next_interval`] grows the
//! interval when many scans were needed to observe a completion and shrinks
//! it otherwise, bounded by a floor and a ceiling.

use serde::Deserialize;
use tracing::debug;

/// Tuning knobs for the adaptive polling loop.
///
/// The defaults are inherited behavior; there is no documented derivation
/// for them, which is why they are configuration rather than constants.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct PollTuning {
    /// Scan count above which the interval grows.
    pub scan_threshold: u32,
    /// Lower bound for the interval, in seconds.
    pub floor: f64,
    /// Upper bound for the interval, in seconds.
    pub ceiling: f64,
    /// Growth factor applied when polling looks too eager.
    pub grow: f64,
    /// Shrink factor applied when completions come in quickly.
    pub shrink: f64,
    /// Interval used for the first polling round, in seconds.
    pub initial: f64,
}

impl Default for PollTuning {
    fn default() -> Self {
        Self {
            scan_threshold: 8,
            floor: 0.0001,
            ceiling: 1.0,
            grow: 1.25,
            shrink: 0.75,
            initial: 0.1,
        }
    }
}

/// Compute the next polling interval from the number of scans the last
/// wait-and-poll round needed before a worker completed.
///
/// Pure function: repeated application keeps the result within
/// `[tuning.floor, tuning.ceiling]`.
pub fn next_interval(tuning: &PollTuning, scan_count: u32, current: f64) -> f64 {
    if scan_count > tuning.scan_threshold && current < tuning.ceiling {
        let next = (current * tuning.grow).min(tuning.ceiling);
        debug!(interval = next, "increasing poll interval");
        next
    } else if current > tuning.floor {
        let next = (current * tuning.shrink).max(tuning.floor);
        debug!(interval = next, "decreasing poll interval");
        next
    } else {
        current
    }
}
