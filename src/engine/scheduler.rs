// src/engine/scheduler.rs

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::dag::{Dag, Pull, ReadyIter};
use crate::engine::poll::{next_interval, PollTuning};
use crate::engine::worker::{CancelToken, Worker};
use crate::errors::SchedulerError;
use crate::status::RunningStatus;

/// Callback turning a ready fragment into a live worker.
///
/// Arguments: fragment id, payload, assigned slot. Failure here is a
/// configuration bug; the scheduler propagates it instead of recovering.
pub type JobFactory<'a, P, W> = Box<dyn FnMut(&str, &P, usize) -> anyhow::Result<W> + 'a>;

/// Callback extracting results from a finished worker.
///
/// Invoked once per worker, after its slot has been released and the
/// iterator notified, while the worker object is still valid.
pub type CollectResult<'a, W> = Box<dyn FnMut(&mut W) + 'a>;

/// Knobs that influence how the scheduler runs.
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Number of execution slots; the hard bound on concurrency. Must be
    /// at least 1.
    pub parallelism: usize,
    pub poll: PollTuning,
    /// If false, the polling interval stays at `poll.initial`.
    pub dyn_poll_interval: bool,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            parallelism: 1,
            poll: PollTuning::default(),
            dyn_poll_interval: true,
        }
    }
}

/// Interval used while draining workers after a cancellation.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Slot-bounded scheduler: fills free slots from the ready iterator, polls
/// in-flight workers for completion, and feeds completions back into the
/// iterator.
///
/// The loop itself is single-threaded cooperative polling; concurrency comes
/// from the workers (blocking tasks or subprocesses), each bound to one of
/// `parallelism` slots.
pub struct Scheduler<'d, P, W: Worker> {
    iter: ReadyIter<'d, P>,

    /// Fixed-size slot table. `slots[n]`, when occupied, owns the worker
    /// whose slot id is `n`.
    slots: Vec<Option<W>>,
    active_workers: usize,

    job_factory: JobFactory<'d, P, W>,
    collect_result: CollectResult<'d, W>,

    status: Arc<RunningStatus>,
    cancel: CancelToken,

    tuning: PollTuning,
    dyn_poll_interval: bool,
    poll_interval: f64,

    /// Work remains but all of it depends on non-completed fragments.
    no_free_item: bool,
    /// The iterator signalled exhaustion.
    no_work_left: bool,
}

impl<'d, P, W: Worker> Scheduler<'d, P, W> {
    pub fn new(
        dag: &'d Dag<P>,
        options: SchedulerOptions,
        status: Arc<RunningStatus>,
        cancel: CancelToken,
        job_factory: JobFactory<'d, P, W>,
        collect_result: CollectResult<'d, W>,
    ) -> Self {
        assert!(options.parallelism >= 1, "parallelism must be >= 1");
        let slots = (0..options.parallelism).map(|_| None).collect();
        Self {
            iter: ReadyIter::new(dag),
            slots,
            active_workers: 0,
            job_factory,
            collect_result,
            status,
            cancel,
            tuning: options.poll,
            dyn_poll_interval: options.dyn_poll_interval,
            poll_interval: options.poll.initial,
            no_free_item: false,
            no_work_left: false,
        }
    }

    pub fn parallelism(&self) -> usize {
        self.slots.len()
    }

    pub fn active_workers(&self) -> usize {
        self.active_workers
    }

    fn has_free_slots(&self) -> bool {
        self.active_workers < self.slots.len()
    }

    /// Whether dispatching new fragments is over: either the iterator is
    /// exhausted, or the circuit breaker asked for an abort, in which case
    /// the iterator is treated as exhausted for dispatch purposes while
    /// in-flight workers drain normally.
    fn dispatch_done(&self) -> bool {
        self.no_work_left || self.status.abort_requested()
    }

    /// Drive all fragments to completion.
    ///
    /// Returns `Ok(())` once every dispatched worker has been collected and
    /// no dispatchable work remains (including the abort-for-failures case),
    /// or `Err(SchedulerError::Interrupted)` after a cancellation drain.
    pub async fn run(&mut self) -> Result<(), SchedulerError> {
        info!(parallelism = self.slots.len(), "scheduler started");

        while self.active_workers > 0 || !self.dispatch_done() {
            if self.cancel.is_cancelled() {
                return self.drain().await;
            }
            self.poll_once().await?;
        }

        info!("scheduler finished");
        Ok(())
    }

    /// One scheduling iteration: fill free slots, then wait for completions
    /// while no further dispatch is possible.
    async fn poll_once(&mut self) -> Result<(), SchedulerError> {
        // Linear scan for free slots. Skipped when there is no work left,
        // all slots are occupied, or everything pending is blocked.
        if !self.dispatch_done() && self.has_free_slots() && !self.no_free_item {
            for slot in 0..self.slots.len() {
                if self.slots[slot].is_some() {
                    continue;
                }
                match self.iter.next_ready() {
                    Pull::Exhausted => {
                        self.no_work_left = true;
                        break;
                    }
                    Pull::Blocked => {
                        // Everything pending waits on a busy predecessor; no
                        // point scanning further slots.
                        self.no_free_item = true;
                        break;
                    }
                    Pull::Ready(uid, data) => {
                        debug!(fragment = %uid, slot, "dispatching fragment");
                        let worker = (self.job_factory)(uid, data, slot).map_err(|source| {
                            SchedulerError::WorkerFactory {
                                uid: uid.to_string(),
                                source,
                            }
                        })?;
                        self.slots[slot] = Some(worker);
                        self.active_workers += 1;
                        if !self.has_free_slots() {
                            break;
                        }
                    }
                }
            }
        }

        // Wait for completions while all slots are busy, pending work is
        // blocked, or dispatch is over but workers remain.
        debug!("waiting for a free worker slot");
        let mut scan_count: u32 = 0;
        while !self.has_free_slots()
            || (self.no_free_item && self.active_workers > 0)
            || (self.dispatch_done() && self.active_workers > 0)
        {
            if self.cancel.is_cancelled() {
                // Handled at the top of the run loop.
                return Ok(());
            }
            scan_count += 1;
            for slot in 0..self.slots.len() {
                if let Some(mut worker) = self.take_finished(slot) {
                    self.iter.leave(worker.uid());
                    // A predecessor completed, so blocked work may be ready.
                    self.no_free_item = false;
                    debug!(fragment = %worker.uid(), slot, "worker finished, collecting");
                    (self.collect_result)(&mut worker);
                }
            }
            tokio::time::sleep(Duration::from_secs_f64(self.poll_interval)).await;
        }

        if self.dyn_poll_interval {
            self.poll_interval = next_interval(&self.tuning, scan_count, self.poll_interval);
        }
        Ok(())
    }

    /// Cancellation path: poll remaining workers to completion, release
    /// their slots and mark them left, but never collect their results.
    async fn drain(&mut self) -> Result<(), SchedulerError> {
        error!("scheduling abortion requested, waiting for all active workers...");

        while self.active_workers > 0 {
            for slot in 0..self.slots.len() {
                if let Some(worker) = self.take_finished(slot) {
                    debug!(
                        fragment = %worker.uid(),
                        slot,
                        "worker released without collection"
                    );
                    self.iter.leave(worker.uid());
                }
            }
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }

        Err(SchedulerError::Interrupted)
    }

    /// If the worker in `slot` has finished, release the slot and hand the
    /// worker back.
    fn take_finished(&mut self, slot: usize) -> Option<W> {
        let finished = match self.slots[slot].as_mut() {
            Some(worker) => !worker.is_running(),
            None => false,
        };
        if !finished {
            return None;
        }
        let worker = self.slots[slot].take();
        if worker.is_some() {
            self.active_workers -= 1;
        }
        worker
    }
}
