//! Configuration management for shikaku.
//!
//! Handles loading, saving, and validating configuration from
//! platform-specific config directories.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application name used for config directory.
const APP_NAME: &str = "Shikaku";

/// Default config filename.
const CONFIG_FILENAME: &str = "config.toml";

/// Card directory of the Aozora Bunko GitHub mirror.
pub const DEFAULT_BASE_URL: &str =
    "https://raw.githubusercontent.com/aozorabunko/aozorabunko/master/cards/";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Aozora Bunko catalog settings.
    pub aozora: AozoraConfig,
}

/// Aozora Bunko catalog configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AozoraConfig {
    /// Base URL of the `cards/` directory; author directories are joined onto it.
    pub base_url: String,

    /// Request timeout in seconds.
    pub timeout_sec: u64,

    /// User agent sent with every request.
    pub user_agent: String,
}

impl Default for AozoraConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_sec: 30,
            user_agent: concat!("shikaku/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Config {
    /// Returns the platform-specific config directory path.
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|p| p.join(APP_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Returns the full path to the config file.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join(CONFIG_FILENAME))
    }

    /// Loads configuration from the default location.
    ///
    /// If the config file doesn't exist, creates a default one.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Config::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        Ok(config)
    }

    /// Saves configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    /// Saves configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.aozora.validate()
    }
}

impl AozoraConfig {
    /// Validates the catalog settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = url::Url::parse(&self.base_url).map_err(|e| {
            ConfigError::InvalidValue {
                key: "aozora.base_url".to_string(),
                message: e.to_string(),
            }
        })?;

        // Relative joins drop the last path segment unless it ends in '/'.
        if !base.path().ends_with('/') {
            return Err(ConfigError::InvalidValue {
                key: "aozora.base_url".to_string(),
                message: "must end with '/'".to_string(),
            });
        }

        if self.timeout_sec == 0 {
            return Err(ConfigError::InvalidValue {
                key: "aozora.timeout_sec".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}
