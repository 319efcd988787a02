//! Configuration for the webhook API server.
//!
//! The configuration is read from an optional TOML file. Every field has a
//! default, so a missing file or an empty one gives a working server. The
//! engine sections (`[delivery]`, `[scheduler]`, `[registry]`) sit at the top
//! level next to `[server]`.
//!
//! `API_HOST` and `API_PORT` override the `[server]` values.
//!
//! # Example TOML Configuration
//!
//! ```toml
//! log_format = "json"
//!
//! [server]
//! host = "127.0.0.1"
//! port = 9000
//!
//! [delivery]
//! workers = 8
//!
//! [scheduler]
//! interval_secs = 5
//! ```

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use webhook_core::EngineConfig;

use crate::DEFAULT_PORT;

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to parse configuration file: {0}")]
    Parse(String),

    #[error("Invalid value '{value}' for environment variable {name}")]
    InvalidEnv { name: String, value: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,

    pub log_format: LogFormat,

    #[serde(flatten)]
    pub engine: EngineConfig,
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// * `ConfigError::Read` - The file is missing or unreadable
    /// * `ConfigError::Parse` - The file is not valid TOML for this schema
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!("Loading configuration from {:?}", path);

        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Applies `API_HOST` and `API_PORT` overrides read through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("API_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("API_PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidEnv {
                name: "API_PORT".to_string(),
                value: port,
            })?;
        }
        Ok(())
    }
}
