//! Configuration management for the watch core.
//!
//! Settings load from an optional TOML file with `VIGIL_`-prefixed
//! environment variables layered on top (highest priority). Every field
//! has a hardcoded default so an empty configuration is valid.

mod monitoring;
mod replication;
mod retry;
mod watch;


pub use monitoring::*;
pub use replication::*;
pub use retry::*;
pub use watch::*;

//---
use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;

use crate::Result;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    /// History sizing for new watches
    #[serde(default)]
    pub watch: WatchConfig,
    /// Replication pipeline tuning
    #[serde(default)]
    pub replication: ReplicationConfig,
    /// Retry policies for remote watch access
    #[serde(default)]
    pub retry: RetryPolicies,
    /// Metrics endpoint settings
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

impl Settings {
    /// Loads settings from `config_path` (optional file) plus
    /// `VIGIL_`-prefixed environment overrides, e.g.
    /// `VIGIL_REPLICATION__DRAIN_TIMEOUT_MS=5000`.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(false));
        }
        let settings: Settings = builder
            .add_source(
                Environment::with_prefix("VIGIL")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validates every section.
    /// # Errors
    /// Returns the first section-level validation failure.
    pub fn validate(&self) -> Result<()> {
        self.watch.validate()?;
        self.replication.validate()?;
        self.monitoring.validate()?;
        Ok(())
    }
}
