// src/exec/mod.rs

//! Execution backends.
//!
//! Both backends run opaque fragment bodies and share the scheduler's
//! dependency semantics:
//!
//! - [`local`] executes bodies in-process on blocking tasks.
//! - [`process`] hands work to a separate process through a serialized
//!   exchange artifact ([`exchange`]), avoiding in-process contention at
//!   high parallelism.

pub mod exchange;
pub mod local;
pub mod process;

use std::any::Any;

pub use exchange::{run_worker, ExchangeRequest, ExchangeResponse, EXCHANGE_VERSION};
pub use local::LocalWorker;
pub use process::{ProcessWorker, WorkerCommand};

/// Best-effort extraction of a panic payload for synthetic failure logs.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("fragment body panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("fragment body panicked: {s}")
    } else {
        "fragment body panicked with a non-string payload".to_string()
    }
}
