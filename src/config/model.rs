// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::engine::poll::PollTuning;
use crate::engine::scheduler::SchedulerOptions;
use crate::status::RunningStatus;

/// Scheduling configuration, typically read from a TOML file:
///
/// ```toml
/// parallelism = 4
/// max_consecutive_failures = 10
/// status_file = "out/status"
///
/// [poll]
/// scan_threshold = 8
/// ceiling = 1.0
/// ```
///
/// All fields have defaults, so an empty file is a valid configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Number of execution slots. 0 means "number of available cores".
    pub parallelism: usize,

    /// Whether to adapt the polling interval at runtime; when false the
    /// interval stays at `poll.initial`.
    pub dyn_poll_interval: bool,

    pub poll: PollTuning,

    /// Consecutive failure results that trigger an abort of the run.
    /// 0 disables the circuit breaker.
    pub max_consecutive_failures: u32,

    /// Where to write the human-readable status snapshot; `None` disables
    /// status dumps entirely.
    pub status_file: Option<PathBuf>,

    /// Minimum number of seconds between status file updates.
    pub status_update_interval: f64,

    /// Directory for exchange artifacts; defaults to the system temporary
    /// directory.
    pub exchange_dir: Option<PathBuf>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            parallelism: 0,
            dyn_poll_interval: true,
            poll: PollTuning::default(),
            max_consecutive_failures: 0,
            status_file: None,
            status_update_interval: 1.0,
            exchange_dir: None,
        }
    }
}

impl SchedulerConfig {
    /// Effective slot count: the configured value, or the number of
    /// available cores when left at 0.
    pub fn resolved_parallelism(&self) -> usize {
        if self.parallelism > 0 {
            self.parallelism
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }

    pub fn effective_exchange_dir(&self) -> PathBuf {
        self.exchange_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs_f64(self.status_update_interval)
    }

    /// Options for [`crate::engine::Scheduler::new`].
    pub fn scheduler_options(&self) -> SchedulerOptions {
        SchedulerOptions {
            parallelism: self.resolved_parallelism(),
            poll: self.poll,
            dyn_poll_interval: self.dyn_poll_interval,
        }
    }

    /// Build the [`RunningStatus`] matching this configuration.
    pub fn running_status(&self) -> RunningStatus {
        RunningStatus::new(
            self.status_file.clone(),
            self.update_interval(),
            self.max_consecutive_failures,
        )
    }
}
