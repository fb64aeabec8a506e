// src/dag/mod.rs

//! Fragment DAG and the ready-iteration protocol.
//!
//! - [`graph`] holds the directed acyclic graph of fragment ids.
//! - [`ready`] yields fragments whose predecessors have all completed, and
//!   tracks busy versus blocked work.

pub mod graph;
pub mod ready;

pub use graph::Dag;
pub use ready::{Pull, ReadyIter};
