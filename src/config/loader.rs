// src/config/loader.rs

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::config::model::SchedulerConfig;
use crate::config::validate::validate_config;

/// Read a [`SchedulerConfig`] from a TOML file without validating it.
pub fn load_config(path: &Path) -> Result<SchedulerConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    let cfg: SchedulerConfig = toml::from_str(&text)
        .with_context(|| format!("parsing config file {}", path.display()))?;
    debug!(path = %path.display(), "configuration loaded");
    Ok(cfg)
}

/// Read and semantically validate a [`SchedulerConfig`].
pub fn load_and_validate(path: &Path) -> Result<SchedulerConfig> {
    let cfg = load_config(path)?;
    validate_config(&cfg)
        .with_context(|| format!("validating config file {}", path.display()))?;
    Ok(cfg)
}
