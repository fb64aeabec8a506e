// src/engine/mod.rs

//! Slot-bounded scheduling engine.
//!
//! - [`scheduler`] owns the slot table and drives the dispatch/poll loop.
//! - [`poll`] computes the adaptive polling interval.
//! - [`worker`] defines the backend-agnostic worker abstraction and the
//!   cancellation token.

pub mod poll;
pub mod scheduler;
pub mod worker;

pub use poll::{next_interval, PollTuning};
pub use scheduler::{Scheduler, SchedulerOptions};
pub use worker::{next_worker_index, CancelToken, Worker};
