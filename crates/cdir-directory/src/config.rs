use std::path::Path;

use cdir_gate::GateConfig;
use cdir_schema::Limits;
use serde::{Deserialize, Serialize};

use crate::error::{DirectoryError, DirectoryResult};

/// Runtime configuration of a directory.
///
/// Every field has a default, so a TOML file only needs the keys it changes:
///
/// ```toml
/// max_operations_per_batch = 20
///
/// [limits]
/// max_number_of_classes = 10
///
/// [gate]
/// permissive = true
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Upper bound on the number of operations in one batch.
    pub max_operations_per_batch: usize,
    pub limits: Limits,
    pub gate: GateConfig,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            max_operations_per_batch: 100,
            limits: Limits::default(),
            gate: GateConfig::default(),
        }
    }
}

impl DirectoryConfig {
    pub fn from_toml(text: &str) -> DirectoryResult<Self> {
        toml::from_str(text).map_err(|e| DirectoryError::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> DirectoryResult<String> {
        toml::to_string_pretty(self).map_err(|e| DirectoryError::Config(e.to_string()))
    }

    /// Read a TOML configuration file.
    pub fn load(path: &Path) -> DirectoryResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| DirectoryError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }
}
