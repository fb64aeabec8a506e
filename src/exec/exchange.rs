// src/exec/exchange.rs

//! Exchange artifact: the serialization boundary between the scheduling
//! process and a worker process.
//!
//! The artifact is a versioned, tagged union: the parent writes a request,
//! the child overwrites the same file with a response before exiting. The
//! parent never inspects the child's in-memory state; exit status and this
//! file are the whole protocol.

use std::fs;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::ExchangeError;
use crate::exec::panic_message;
use crate::fragment::{PreviousValues, TaskContext, TaskEnv, TaskRegistry};
use crate::result::ResultRecord;

/// Version stamped into every payload; readers reject anything else.
pub const EXCHANGE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExchangePayload {
    Request(ExchangeRequest),
    Response(ExchangeResponse),
}

/// Outbound snapshot: the minimal state a worker process needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRequest {
    pub version: u32,
    pub uid: String,
    /// Worker index, tie-breaker for derived result names.
    pub index: u64,
    /// Task body name, resolved via the child's [`TaskRegistry`].
    pub callback: String,
    #[serde(default)]
    pub env: TaskEnv,
    pub slot: usize,
}

impl ExchangeRequest {
    pub fn new(
        uid: impl Into<String>,
        index: u64,
        callback: impl Into<String>,
        env: TaskEnv,
        slot: usize,
    ) -> Self {
        Self {
            version: EXCHANGE_VERSION,
            uid: uid.into(),
            index,
            callback: callback.into(),
            env,
            slot,
        }
    }
}

/// Inbound payload: the results the fragment body produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeResponse {
    pub version: u32,
    pub results: Vec<ResultRecord>,
}

impl ExchangeResponse {
    pub fn new(results: Vec<ResultRecord>) -> Self {
        Self {
            version: EXCHANGE_VERSION,
            results,
        }
    }
}

pub fn write_request(path: &Path, request: &ExchangeRequest) -> Result<(), ExchangeError> {
    write_payload(path, &ExchangePayload::Request(request.clone()))
}

pub fn write_response(path: &Path, response: &ExchangeResponse) -> Result<(), ExchangeError> {
    write_payload(path, &ExchangePayload::Response(response.clone()))
}

pub fn read_request(path: &Path) -> Result<ExchangeRequest, ExchangeError> {
    match read_payload(path)? {
        ExchangePayload::Request(request) => {
            check_version(path, request.version)?;
            Ok(request)
        }
        ExchangePayload::Response(_) => Err(ExchangeError::UnexpectedShape {
            path: path.to_path_buf(),
            found: "response",
            expected: "request",
        }),
    }
}

pub fn read_response(path: &Path) -> Result<ExchangeResponse, ExchangeError> {
    match read_payload(path)? {
        ExchangePayload::Response(response) => {
            check_version(path, response.version)?;
            Ok(response)
        }
        ExchangePayload::Request(_) => Err(ExchangeError::UnexpectedShape {
            path: path.to_path_buf(),
            found: "request",
            expected: "response",
        }),
    }
}

fn write_payload(path: &Path, payload: &ExchangePayload) -> Result<(), ExchangeError> {
    let data = serde_json::to_vec_pretty(payload).map_err(|source| ExchangeError::Encode {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, data).map_err(|source| ExchangeError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_payload(path: &Path) -> Result<ExchangePayload, ExchangeError> {
    let data = fs::read(path).map_err(|source| ExchangeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&data).map_err(|source| ExchangeError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

fn check_version(path: &Path, found: u32) -> Result<(), ExchangeError> {
    if found == EXCHANGE_VERSION {
        Ok(())
    } else {
        Err(ExchangeError::VersionMismatch {
            path: path.to_path_buf(),
            found,
            expected: EXCHANGE_VERSION,
        })
    }
}

/// Worker-process entry point.
///
/// Reads the request from `exchange_path`, executes the fragment body and
/// writes the response back to the same path. A panicking body, or a
/// callback missing from `registry`, becomes a single synthetic failure
/// result in the response; only artifact-level I/O problems make this
/// return an error (and the process exit non-zero).
pub fn run_worker(registry: &TaskRegistry, exchange_path: &Path) -> Result<(), ExchangeError> {
    let request = read_request(exchange_path)?;
    debug!(fragment = %request.uid, slot = request.slot, "worker process executing fragment");
    let results = execute_request(registry, &request);
    write_response(exchange_path, &ExchangeResponse::new(results))
}

fn execute_request(registry: &TaskRegistry, request: &ExchangeRequest) -> Vec<ResultRecord> {
    let Some(body) = registry.get(&request.callback) else {
        return vec![ResultRecord::synthetic_failure(
            &request.uid,
            request.index,
            format!("unknown task callback '{}'", request.callback),
        )];
    };

    // Return values are not propagated across the process boundary, so
    // dependents always see an empty snapshot here.
    let previous_values = PreviousValues::new();
    let ctx = TaskContext {
        uid: &request.uid,
        env: &request.env,
        previous_values: &previous_values,
        slot: request.slot,
    };

    match catch_unwind(AssertUnwindSafe(|| body.execute(&ctx))) {
        Ok(output) => output.results,
        Err(panic) => vec![ResultRecord::synthetic_failure(
            &request.uid,
            request.index,
            panic_message(&*panic),
        )],
    }
}
