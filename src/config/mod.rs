//! # Configuration System
//!
//! Environment-aware YAML configuration for the dispatch core. Startup
//! inputs (the database endpoint and the error destination) come from a
//! base file plus an optional per-environment overlay; they are loaded once
//! at process start and are not reloadable at runtime.

pub mod loader;

use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, Result};

pub use loader::ConfigManager;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PagekitConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

impl Default for PagekitConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            dispatch: DispatchConfig::default(),
        }
    }
}

impl PagekitConfig {
    /// Validate the loaded configuration. No silent fallbacks: a config that
    /// cannot route errors or reach a database is rejected at startup.
    pub fn validate(&self) -> Result<()> {
        if self.dispatch.error_destination.is_empty() {
            return Err(DispatchError::configuration(
                "dispatch.error_destination must not be empty",
            ));
        }
        if self.database.database.is_empty() {
            return Err(DispatchError::configuration(
                "database.database must not be empty",
            ));
        }
        if self.database.host.is_empty() {
            return Err(DispatchError::configuration(
                "database.host must not be empty",
            ));
        }
        Ok(())
    }
}

/// Database endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Full connection URL override. When set, the individual fields above
    /// are ignored.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database: default_database(),
            username: default_username(),
            password: String::new(),
            url: None,
        }
    }
}

impl DatabaseConfig {
    /// The connection URL, either the explicit override or one assembled
    /// from the individual fields.
    pub fn connection_url(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        format!(
            "postgresql://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }
}

/// Dispatch behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatchConfig {
    /// Logical destination every failed dispatch is forwarded to.
    #[serde(default = "default_error_destination")]
    pub error_destination: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            error_destination: default_error_destination(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_database() -> String {
    "pagekit_development".to_string()
}

fn default_username() -> String {
    "pagekit".to_string()
}

fn default_error_destination() -> String {
    "/error".to_string()
}
