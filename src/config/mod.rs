// src/config/mod.rs

//! Scheduler configuration.
//!
//! - [`model`] defines the [`SchedulerConfig`] structure.
//! - [`loader`] reads it from a TOML file.
//! - [`validate`] performs semantic validation beyond what serde enforces.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_config};
pub use model::SchedulerConfig;
pub use validate::validate_config;
