//! Server configuration, read from YAML.
//!
//! Every field has a default, so an empty file (or none at all) gives a
//! working configuration:
//!
//! ```yaml
//! storage:
//!   mode: document
//!   location: ./data
//!   flush_interval: 3600
//! simulation:
//!   ship_tick: 1.0
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::persistence::StorageMode;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub storage: StorageConfig,
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// `snapshot`, `files` or `document`.
    pub mode: String,
    /// Storage directory, or `memory:` for an in-memory document store.
    pub location: String,
    /// When false nothing is read or written.
    pub enabled: bool,
    /// Seconds between full flushes.
    pub flush_interval: f64,
    /// Seconds between dirty-queue flushes in document mode.
    pub dirty_flush_interval: f64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            mode: "snapshot".to_string(),
            location: "data".to_string(),
            enabled: true,
            flush_interval: 3600.0,
            dirty_flush_interval: 5.0,
        }
    }
}

impl StorageConfig {
    pub fn storage_mode(&self) -> Result<StorageMode, ConfigError> {
        self.mode.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seconds between ship ticks.
    pub ship_tick: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self { ship_tick: 1.0 }
    }
}

impl ServerConfig {
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// Checks what serde cannot: the storage mode name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.storage.storage_mode().map(|_| ())
    }
}
