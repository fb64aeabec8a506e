// src/errors.rs

//! Crate-wide error types.
//!
//! Data-level failures (a fragment body panicking, a worker process dying, a
//! corrupted exchange artifact) never show up here: they are recovered into
//! synthetic failure results by the execution backends. The types below cover
//! construction-time problems (bad DAGs, unreadable artifacts) and the one
//! way a scheduling run can end abnormally (external interruption).

use std::path::PathBuf;

use thiserror::Error;

pub use anyhow::Result;

/// Errors detected while building or checking a fragment DAG.
#[derive(Debug, Error)]
pub enum DagError {
    #[error("duplicate fragment id '{0}'")]
    DuplicateId(String),

    #[error("fragment '{node}' lists unknown predecessor '{pred}'")]
    UnknownPredecessor { node: String, pred: String },

    #[error("cycle detected in fragment DAG involving '{0}'")]
    Cycle(String),
}

/// Errors surfaced by [`crate::engine::Scheduler::run`].
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The cancellation token fired. All in-flight workers were drained and
    /// their slots released, but none of them were collected.
    #[error("scheduling interrupted; active workers drained without collection")]
    Interrupted,

    /// The caller-supplied worker factory failed. This is a configuration
    /// bug, so the scheduler does not try to recover from it.
    #[error("worker factory failed for fragment '{uid}'")]
    WorkerFactory {
        uid: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Errors around the exchange artifact used by the subprocess backend.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("cannot access exchange artifact {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot encode exchange artifact {path:?}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed exchange artifact {path:?}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("exchange artifact {path:?} has version {found}, expected {expected}")]
    VersionMismatch {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    #[error("exchange artifact {path:?} holds a {found} payload, expected a {expected}")]
    UnexpectedShape {
        path: PathBuf,
        found: &'static str,
        expected: &'static str,
    },
}
