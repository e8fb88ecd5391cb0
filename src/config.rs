//! Store configuration
//!
//! All fields have defaults, so a YAML file only needs the values it changes:
//!
//! ```yaml
//! vertex_capacity: 10000
//! isolation: exclusive
//! lock_timeout_ms: 250
//! undo:
//!   max_entries: 20
//! ```

use crate::txn::{IsolationMode, UndoConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Configuration of a [`Graph`](crate::Graph)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Initial vertex capacity
    pub vertex_capacity: usize,
    /// Initial transaction capacity
    pub transaction_capacity: usize,
    pub isolation: IsolationMode,
    /// Maximum wait for a lock; `None` waits indefinitely
    pub lock_timeout_ms: Option<u64>,
    /// Keep only the last value change per (attribute, element) within a transaction
    pub compact_journal: bool,
    /// Merge elements with clashing primary keys at commit instead of failing
    pub merge_duplicate_keys: bool,
    pub undo: UndoConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            vertex_capacity: crate::graph::core::DEFAULT_VERTEX_CAPACITY,
            transaction_capacity: crate::graph::core::DEFAULT_TRANSACTION_CAPACITY,
            isolation: IsolationMode::Snapshot,
            lock_timeout_ms: None,
            compact_journal: true,
            merge_duplicate_keys: false,
            undo: UndoConfig::default(),
        }
    }
}

impl StoreConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout_ms.map(Duration::from_millis)
    }
}
