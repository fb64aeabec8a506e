// src/exec/local.rs

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::anyhow;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::engine::worker::{next_worker_index, Worker};
use crate::exec::panic_message;
use crate::fragment::{FragmentData, PreviousValues, TaskContext, TaskOutput, TaskRegistry};
use crate::result::ResultRecord;
use crate::status::RunningStatus;

/// In-process worker: runs the fragment body on a blocking task.
///
/// The body executes on a dedicated blocking thread; its panic never reaches
/// the scheduler (it is converted into a synthetic failure result). The
/// running-status `start`/`complete` hooks fire from the worker thread,
/// which is why [`RunningStatus`] carries its own lock.
pub struct LocalWorker {
    uid: String,
    slot: usize,
    index: u64,
    handle: JoinHandle<()>,
    output: Arc<Mutex<Option<TaskOutput>>>,
}

impl LocalWorker {
    /// Resolve the fragment's body and start executing it.
    ///
    /// Fails only if the callback is missing from the registry, which is a
    /// configuration error the scheduler will not recover from. Must be
    /// called from within a Tokio runtime.
    pub fn spawn(
        fragment: &FragmentData,
        slot: usize,
        previous_values: PreviousValues,
        registry: &TaskRegistry,
        status: Arc<RunningStatus>,
    ) -> anyhow::Result<Self> {
        let body = registry.get(&fragment.callback).ok_or_else(|| {
            anyhow!(
                "unknown task callback '{}' for fragment '{}'",
                fragment.callback,
                fragment.uid
            )
        })?;

        let index = next_worker_index();
        let uid = fragment.uid.clone();
        let env = fragment.env.clone();
        let output = Arc::new(Mutex::new(None));

        let task_uid = uid.clone();
        let task_output = Arc::clone(&output);
        let handle = tokio::task::spawn_blocking(move || {
            status.start(&task_uid);

            let ctx = TaskContext {
                uid: &task_uid,
                env: &env,
                previous_values: &previous_values,
                slot,
            };
            let produced = match catch_unwind(AssertUnwindSafe(|| body.execute(&ctx))) {
                Ok(output) => output,
                Err(panic) => TaskOutput::new(vec![ResultRecord::synthetic_failure(
                    &task_uid,
                    index,
                    panic_message(&*panic),
                )]),
            };

            // The output must be in place before the handle reports the task
            // as finished, i.e. before this closure returns.
            *task_output.lock() = Some(produced);
            status.complete(&task_uid);
        });

        debug!(fragment = %uid, slot, "fragment dispatched to blocking task");
        Ok(Self {
            uid,
            slot,
            index,
            handle,
            output,
        })
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    /// Take the produced output. Valid once, after the worker finished.
    ///
    /// # Panics
    ///
    /// Collecting before completion, or twice, is a caller bug and panics.
    pub fn take_output(&mut self) -> TaskOutput {
        self.output
            .lock()
            .take()
            .unwrap_or_else(|| panic!("output for fragment '{}' collected before completion", self.uid))
    }
}

impl Worker for LocalWorker {
    fn uid(&self) -> &str {
        &self.uid
    }

    fn slot(&self) -> usize {
        self.slot
    }

    fn is_running(&mut self) -> bool {
        !self.handle.is_finished()
    }
}
