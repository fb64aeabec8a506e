// src/status.rs

//! Run-wide status aggregation and the consecutive-failure circuit breaker.
//!
//! Workers report `start`/`complete` from their own execution contexts
//! (blocking threads, subprocess collection) while the scheduling loop reads
//! the abort flag and feeds in results, hence the single mutex around all of
//! the mutable state.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{error, warn};

use crate::result::{ResultRecord, TestStatus};

#[derive(Debug, Default)]
struct StatusInner {
    /// Total number of fragments in the DAG, once known.
    total: Option<usize>,
    running: BTreeSet<String>,
    completed: BTreeSet<String>,
    counters: BTreeMap<TestStatus, usize>,
    consecutive_failures: u32,
    abort: bool,
    /// Earliest instant the status file may be written again.
    no_update_before: Option<Instant>,
}

/// Thread-safe aggregator of in-flight and completed fragments.
///
/// Also acts as the circuit breaker: when `max_consecutive_failures` (> 0)
/// failure results arrive without a non-failure in between, the abort flag
/// is set and the scheduler stops dispatching new fragments.
pub struct RunningStatus {
    status_file: Option<PathBuf>,
    /// Minimum delay between two status file writes; zero disables the
    /// rate limit.
    update_interval: Duration,
    max_consecutive_failures: u32,
    inner: Mutex<StatusInner>,
}

impl RunningStatus {
    pub fn new(
        status_file: Option<PathBuf>,
        update_interval: Duration,
        max_consecutive_failures: u32,
    ) -> Self {
        Self {
            status_file,
            update_interval,
            max_consecutive_failures,
            inner: Mutex::new(StatusInner::default()),
        }
    }

    /// Record the DAG size. Must be called exactly once, before scheduling.
    pub fn set_total(&self, total: usize) {
        {
            let mut inner = self.inner.lock();
            assert!(inner.total.is_none(), "total fragment count set twice");
            inner.total = Some(total);
        }
        self.dump();
    }

    /// Record a fragment as running.
    ///
    /// # Panics
    ///
    /// Starting the same fragment twice, or after its completion, is a
    /// caller bug and panics.
    pub fn start(&self, uid: &str) {
        {
            let mut inner = self.inner.lock();
            assert!(
                !inner.completed.contains(uid),
                "fragment '{uid}' started after completion"
            );
            assert!(
                inner.running.insert(uid.to_string()),
                "fragment '{uid}' started twice"
            );
        }
        self.dump();
    }

    /// Move a fragment from the running set to the completed set.
    ///
    /// # Panics
    ///
    /// Completing a fragment that is not running (never started, or already
    /// completed) panics.
    pub fn complete(&self, uid: &str) {
        {
            let mut inner = self.inner.lock();
            assert!(
                inner.running.remove(uid),
                "fragment '{uid}' completed but is not running"
            );
            inner.completed.insert(uid.to_string());
        }
        self.dump();
    }

    /// Account for one test result and update the circuit breaker.
    pub fn process_result(&self, result: &ResultRecord) {
        {
            let mut inner = self.inner.lock();
            *inner.counters.entry(result.status).or_insert(0) += 1;

            if result.status.is_failure() {
                inner.consecutive_failures += 1;
                if self.max_consecutive_failures > 0
                    && inner.consecutive_failures >= self.max_consecutive_failures
                    && !inner.abort
                {
                    inner.abort = true;
                    error!(
                        consecutive_failures = inner.consecutive_failures,
                        "too many consecutive failures, aborting the run"
                    );
                }
            } else {
                inner.consecutive_failures = 0;
            }
        }
        self.dump();
    }

    /// Whether the circuit breaker asked to stop dispatching new fragments.
    pub fn abort_requested(&self) -> bool {
        self.inner.lock().abort
    }

    pub fn running_count(&self) -> usize {
        self.inner.lock().running.len()
    }

    pub fn completed_count(&self) -> usize {
        self.inner.lock().completed.len()
    }

    /// Snapshot of the per-status result counters.
    pub fn counters(&self) -> BTreeMap<TestStatus, usize> {
        self.inner.lock().counters.clone()
    }

    /// Write a human-readable snapshot to the status file, at most once per
    /// `update_interval`. A no-op when no status file is configured.
    pub fn dump(&self) {
        let Some(path) = &self.status_file else {
            return;
        };

        let text = {
            let mut inner = self.inner.lock();
            let now = Instant::now();
            if !self.update_interval.is_zero() {
                if let Some(not_before) = inner.no_update_before {
                    if now < not_before {
                        return;
                    }
                }
                inner.no_update_before = Some(now + self.update_interval);
            }
            render(&inner)
        };

        if let Err(err) = fs::write(path, text) {
            warn!(path = %path.display(), error = %err, "failed to write status file");
        }
    }
}

fn render(inner: &StatusInner) -> String {
    let mut out = String::new();

    match inner.total {
        None => out.push_str("No test fragment yet"),
        Some(total) => {
            let _ = writeln!(
                out,
                "Test fragments: {} / {} completed",
                inner.completed.len(),
                total
            );

            out.push_str("Currently running:\n");
            if inner.running.is_empty() {
                out.push_str("  <none>\n");
            } else {
                for uid in inner.running.iter() {
                    let _ = writeln!(out, "  {uid}");
                }
            }

            out.push_str("Partial results:");
            let counted: Vec<_> = inner
                .counters
                .iter()
                .filter(|(_, count)| **count > 0)
                .collect();
            if counted.is_empty() {
                out.push_str("\n  <none>");
            } else {
                for (status, count) in counted {
                    let _ = write!(out, "\n  {:<12} {}", status.name(), count);
                }
            }
        }
    }

    out
}
