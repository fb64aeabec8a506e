// src/lib.rs

//! `fragdag` executes a DAG of test fragments on a bounded pool of
//! execution slots.
//!
//! The core pieces:
//!
//! - [`dag`]: the fragment graph and the ready-iteration protocol that
//!   yields fragments whose dependencies are satisfied.
//! - [`engine`]: the slot-bounded scheduler, its adaptive polling loop, the
//!   worker abstraction and the cancellation token.
//! - [`exec`]: the two interchangeable execution backends — in-process
//!   blocking tasks and worker subprocesses fed through a serialized
//!   exchange artifact.
//! - [`status`]: thread-safe run progress aggregation and the
//!   consecutive-failure circuit breaker.
//! - [`fragment`], [`result`]: fragment payloads, task bodies and the
//!   result records that flow out of them.
//!
//! What fragments exist, how their results are reported and what a "test"
//! means is the caller's business: the scheduler treats fragment bodies as
//! opaque and only decides how, in what order and with what parallelism
//! they run.

pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fragment;
pub mod logging;
pub mod result;
pub mod status;

pub use crate::config::SchedulerConfig;
pub use crate::dag::{Dag, Pull, ReadyIter};
pub use crate::engine::{next_interval, CancelToken, PollTuning, Scheduler, SchedulerOptions, Worker};
pub use crate::errors::{DagError, ExchangeError, SchedulerError};
pub use crate::exec::{
    run_worker, ExchangeRequest, ExchangeResponse, LocalWorker, ProcessWorker, WorkerCommand,
};
pub use crate::fragment::{
    FragmentData, PreviousValues, TaskBody, TaskContext, TaskEnv, TaskOutput, TaskRegistry,
    ValueStore,
};
pub use crate::result::{ResultRecord, TestStatus};
pub use crate::status::RunningStatus;
