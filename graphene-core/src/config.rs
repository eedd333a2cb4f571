//! Host configuration - where extensions live and where logs go
//!
//! Stored as TOML in `~/.config/graphene/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use graphene_extension_api::EXTENSION_CAPABILITY;

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Directory scanned for extension modules
    pub extensions_dir: PathBuf,
    /// Log file written by the CLI; the previous run is kept as `<name>.old.log`
    pub log_file: PathBuf,
    /// Capability tag an exported type must carry to count as an extension
    pub capability: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            extensions_dir: graphene_paths::extensions_dir(),
            log_file: graphene_paths::state_dir().join("graphene.log"),
            capability: EXTENSION_CAPABILITY.to_string(),
        }
    }
}

impl HostConfig {
    /// Load configuration from a TOML file
    ///
    /// Returns the defaults if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent().filter(|p| !p.exists()) {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Default location of the configuration file
    pub fn default_path() -> PathBuf {
        graphene_paths::config_dir().join("config.toml")
    }
}
