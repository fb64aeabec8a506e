// src/config/validate.rs

use anyhow::{anyhow, Result};

use crate::config::model::SchedulerConfig;
use crate::engine::poll::PollTuning;

/// Run semantic validation against a loaded configuration.
///
/// Serde already guarantees types; this checks the relationships between
/// values that a TOML file can still get wrong.
pub fn validate_config(cfg: &SchedulerConfig) -> Result<()> {
    validate_poll_tuning(&cfg.poll)?;

    if cfg.status_update_interval < 0.0 {
        return Err(anyhow!(
            "status_update_interval must be >= 0 (got {})",
            cfg.status_update_interval
        ));
    }

    Ok(())
}

fn validate_poll_tuning(poll: &PollTuning) -> Result<()> {
    if poll.floor <= 0.0 {
        return Err(anyhow!("poll.floor must be > 0 (got {})", poll.floor));
    }
    if poll.floor >= poll.ceiling {
        return Err(anyhow!(
            "poll.floor ({}) must be below poll.ceiling ({})",
            poll.floor,
            poll.ceiling
        ));
    }
    if poll.grow <= 1.0 {
        return Err(anyhow!("poll.grow must be > 1 (got {})", poll.grow));
    }
    if poll.shrink <= 0.0 || poll.shrink >= 1.0 {
        return Err(anyhow!(
            "poll.shrink must be within (0, 1) (got {})",
            poll.shrink
        ));
    }
    if poll.initial <= 0.0 {
        return Err(anyhow!("poll.initial must be > 0 (got {})", poll.initial));
    }
    Ok(())
}
