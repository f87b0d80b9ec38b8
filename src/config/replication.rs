use serde::Deserialize;
use serde::Serialize;

use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReplicationConfig {
    /// Bounded wait on the pipeline queue before the worker re-checks
    /// its shutdown signal (unit: milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Upper bound on the final drain wait during pipeline close
    /// (unit: milliseconds)
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            drain_timeout_ms: default_drain_timeout_ms(),
        }
    }
}

impl ReplicationConfig {
    /// Validates pipeline tuning.
    /// # Errors
    /// Returns `ConfigError` for zero intervals or timeouts.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(config::ConfigError::Message("poll_interval_ms cannot be 0".into()).into());
        }
        if self.drain_timeout_ms == 0 {
            return Err(config::ConfigError::Message("drain_timeout_ms cannot be 0".into()).into());
        }
        Ok(())
    }
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

fn default_drain_timeout_ms() -> u64 {
    30_000
}
