// src/engine/worker.rs

//! Backend-agnostic worker abstraction and cancellation token.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// A unit of dispatched work bound to one execution slot.
///
/// The scheduler only ever asks a worker whether it is still running; how
/// the work executes (blocking task, subprocess) is the backend's business.
pub trait Worker {
    /// Id of the fragment this worker executes.
    fn uid(&self) -> &str;

    /// Slot the worker occupies. Stable for the worker's lifetime.
    fn slot(&self) -> usize;

    /// Non-blocking completion poll: `true` while the work is in flight.
    fn is_running(&mut self) -> bool;
}

static WORKER_INDEX: AtomicU64 = AtomicU64::new(0);

/// Process-wide monotonically increasing worker index, starting at 1.
///
/// Used as a tie-breaker when naming results derived from a fragment (e.g.
/// synthetic failure results), so results from distinct workers never
/// collide in the report.
pub fn next_worker_index() -> u64 {
    WORKER_INDEX.fetch_add(1, Ordering::Relaxed) + 1
}

/// Cooperative cancellation handle.
///
/// Clones share the same flag. The scheduler checks the token at the top of
/// every polling iteration and, once cancelled, drains in-flight workers
/// without collecting their results.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
