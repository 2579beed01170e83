//! Registry configuration loaded from `.dmreg/config.toml`.
//!
//! A missing file is not an error: every field has a default.

use crate::core::error::DmregError;
use crate::core::schemas;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = "config.toml";

/// How `list` treats a thread whose view cannot be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ListPolicy {
    /// Omit threads that fail with an integrity-class error, log them, keep going.
    #[default]
    SkipBroken,
    /// First failure of any kind aborts the whole list.
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_db_name")]
    pub db_name: String,
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default)]
    pub list_policy: ListPolicy,
    /// Whole-resolution retries when a lost creation race cannot see the winner yet.
    #[serde(default = "default_create_retries")]
    pub create_retries: u32,
    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u32,
}

fn default_db_name() -> String {
    schemas::REGISTRY_DB_NAME.to_string()
}

fn default_create_retries() -> u32 {
    3
}

fn default_busy_timeout_secs() -> u32 {
    5
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            db_name: default_db_name(),
            log_format: LogFormat::default(),
            list_policy: ListPolicy::default(),
            create_retries: default_create_retries(),
            busy_timeout_secs: default_busy_timeout_secs(),
        }
    }
}

impl RegistryConfig {
    pub fn validate(&self) -> Result<(), DmregError> {
        if self.db_name.trim().is_empty() || self.db_name.contains(['/', '\\']) {
            return Err(DmregError::ConfigError(format!(
                "db_name must be a plain file name, got {:?}",
                self.db_name
            )));
        }
        if self.busy_timeout_secs == 0 {
            return Err(DmregError::ConfigError(
                "busy_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load config from `<store_root>/config.toml`, falling back to defaults.
pub fn load_config(store_root: &Path) -> Result<RegistryConfig, DmregError> {
    let config_path = store_root.join(CONFIG_FILE_NAME);
    if !config_path.exists() {
        return Ok(RegistryConfig::default());
    }
    let content = fs::read_to_string(&config_path)?;
    let config: RegistryConfig = toml::from_str(&content)
        .map_err(|e| DmregError::ConfigError(format!("{}: {}", config_path.display(), e)))?;
    config.validate()?;
    Ok(config)
}

/// Write the default config unless one already exists. Returns true if written.
pub fn write_default_config(store_root: &Path) -> Result<bool, DmregError> {
    let config_path = store_root.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        return Ok(false);
    }
    fs::create_dir_all(store_root)?;
    let body = toml::to_string_pretty(&RegistryConfig::default())
        .map_err(|e| DmregError::ConfigError(e.to_string()))?;
    fs::write(&config_path, body)?;
    Ok(true)
}
