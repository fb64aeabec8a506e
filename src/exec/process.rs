// src/exec/process.rs

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use anyhow::Context;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::engine::worker::{next_worker_index, Worker};
use crate::exec::exchange::{self, ExchangeRequest};
use crate::fragment::FragmentData;
use crate::result::ResultRecord;
use crate::status::RunningStatus;

/// Command line used to start a worker process. The exchange artifact path
/// is appended as the final argument.
///
/// The spawned program is expected to call [`crate::exec::run_worker`] with
/// that path and its own task registry.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// Out-of-process worker: one spawned subprocess plus the exchange artifact
/// it communicates through.
///
/// The parent never inspects the child beyond its exit status and the
/// artifact; stdout/stderr are captured only for diagnostics on failure.
pub struct ProcessWorker {
    uid: String,
    slot: usize,
    index: u64,
    child: Child,
    exit: Option<ExitStatus>,
    poll_error: Option<String>,
    exchange_path: PathBuf,
    output: Arc<Mutex<String>>,
    status: Arc<RunningStatus>,
    collected: bool,
}

impl ProcessWorker {
    /// Write the exchange request to a fresh path and spawn the worker
    /// process. Must be called from within a Tokio runtime.
    pub fn launch(
        fragment: &FragmentData,
        slot: usize,
        command: &WorkerCommand,
        exchange_dir: &Path,
        status: Arc<RunningStatus>,
    ) -> anyhow::Result<Self> {
        let index = next_worker_index();
        let exchange_path = exchange_dir.join(format!("fragment-{}.json", Uuid::new_v4()));
        let request = ExchangeRequest::new(
            fragment.uid.clone(),
            index,
            fragment.callback.clone(),
            fragment.env.clone(),
            slot,
        );
        exchange::write_request(&exchange_path, &request)
            .with_context(|| format!("writing exchange request for fragment '{}'", fragment.uid))?;

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .arg(&exchange_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning worker process for fragment '{}'", fragment.uid))?;

        let output = Arc::new(Mutex::new(String::new()));
        if let Some(stdout) = child.stdout.take() {
            spawn_capture(stdout, Arc::clone(&output));
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_capture(stderr, Arc::clone(&output));
        }

        status.start(&fragment.uid);
        debug!(
            fragment = %fragment.uid,
            slot,
            artifact = %exchange_path.display(),
            "worker process launched"
        );

        Ok(Self {
            uid: fragment.uid.clone(),
            slot,
            index,
            child,
            exit: None,
            poll_error: None,
            exchange_path,
            output,
            status,
            collected: false,
        })
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    /// Retrieve the results of the finished worker process.
    ///
    /// A non-zero exit yields exactly one synthetic failure result carrying
    /// the captured process output; an unreadable or malformed artifact
    /// yields one carrying the decode error. The artifact is deleted on
    /// every path.
    ///
    /// # Panics
    ///
    /// Collecting while the process still runs, or twice, is a caller bug
    /// and panics.
    pub fn collect_results(&mut self) -> Vec<ResultRecord> {
        assert!(
            !self.collected,
            "results for fragment '{}' collected twice",
            self.uid
        );
        self.collected = true;

        let results = if let Some(err) = &self.poll_error {
            vec![ResultRecord::synthetic_failure(
                &self.uid,
                self.index,
                format!("failed to poll worker process: {err}"),
            )]
        } else {
            match self.exit {
                None => panic!(
                    "results for fragment '{}' collected while its worker process is running",
                    self.uid
                ),
                Some(exit) if !exit.success() => {
                    let log = format!(
                        "worker process exited with {exit}:\n{}",
                        self.output.lock()
                    );
                    vec![ResultRecord::synthetic_failure(&self.uid, self.index, log)]
                }
                Some(_) => match exchange::read_response(&self.exchange_path) {
                    Ok(response) => response.results,
                    Err(err) => vec![ResultRecord::synthetic_failure(
                        &self.uid,
                        self.index,
                        format!("unreadable exchange artifact: {err}"),
                    )],
                },
            }
        };

        if let Err(err) = std::fs::remove_file(&self.exchange_path) {
            warn!(
                fragment = %self.uid,
                artifact = %self.exchange_path.display(),
                error = %err,
                "failed to delete exchange artifact"
            );
        }

        self.status.complete(&self.uid);
        results
    }
}

impl Worker for ProcessWorker {
    fn uid(&self) -> &str {
        &self.uid
    }

    fn slot(&self) -> usize {
        self.slot
    }

    fn is_running(&mut self) -> bool {
        if self.exit.is_some() || self.poll_error.is_some() {
            return false;
        }
        match self.child.try_wait() {
            Ok(Some(exit)) => {
                self.exit = Some(exit);
                false
            }
            Ok(None) => true,
            Err(err) => {
                warn!(fragment = %self.uid, error = %err, "polling worker process failed");
                self.poll_error = Some(err.to_string());
                false
            }
        }
    }
}

impl Drop for ProcessWorker {
    fn drop(&mut self) {
        // Uncollected workers (cancellation drain) would otherwise leak
        // their artifact.
        if !self.collected {
            let _ = std::fs::remove_file(&self.exchange_path);
        }
    }
}

fn spawn_capture(stream: impl AsyncRead + Unpin + Send + 'static, buffer: Arc<Mutex<String>>) {
    tokio::spawn(async move {
        let reader = BufReader::new(stream);
        let mut lines = reader.lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let mut buffer = buffer.lock();
            buffer.push_str(&line);
            buffer.push('\n');
        }
    });
}
