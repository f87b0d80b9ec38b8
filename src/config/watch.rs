use serde::Deserialize;
use serde::Serialize;

use crate::constants::MAX_COLLECTION_SIZE;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WatchConfig {
    /// History capacity handed to newly created watches
    #[serde(default = "default_collection_size")]
    pub collection_size: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            collection_size: default_collection_size(),
        }
    }
}

impl WatchConfig {
    /// Validates history sizing.
    /// # Errors
    /// Returns `ConfigError` when `collection_size` lies outside
    /// `[1, MAX_COLLECTION_SIZE]`; histories clamp silently at runtime,
    /// configuration is held to the stricter standard.
    pub fn validate(&self) -> Result<()> {
        if self.collection_size == 0 || self.collection_size > MAX_COLLECTION_SIZE {
            return Err(config::ConfigError::Message(format!(
                "collection_size {} outside [1, {}]",
                self.collection_size, MAX_COLLECTION_SIZE
            ))
            .into());
        }
        Ok(())
    }
}

fn default_collection_size() -> usize {
    crate::constants::DEFAULT_COLLECTION_SIZE
}
