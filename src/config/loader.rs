//! Configuration Loader
//!
//! Environment-aware configuration loading. Reads `pagekit.yaml` as the base,
//! merges `pagekit-{environment}.yaml` over it when present, deserializes and
//! validates the result.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_yaml::Value as YamlValue;
use tracing::debug;

use super::PagekitConfig;
use crate::error::{DispatchError, Result};

const BASE_FILE: &str = "pagekit.yaml";

/// Loaded configuration plus the environment it was loaded for.
#[derive(Debug)]
pub struct ConfigManager {
    config: PagekitConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection from the default
    /// `config/` directory.
    pub fn load() -> Result<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory.
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> Result<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration with an explicit environment. Useful for tests
    /// that must not touch process-global environment variables.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> Result<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));

        debug!(
            environment,
            directory = %config_directory.display(),
            "Loading configuration"
        );

        let config = Self::load_and_merge_config(&config_directory, environment)?;
        config.validate()?;

        // Log a sanitized copy so credentials never reach the logs.
        let mut sanitized = config.clone();
        sanitized.database.password = "***".to_string();
        if sanitized.database.url.is_some() {
            sanitized.database.url = Some("***".to_string());
        }
        debug!(
            "Configuration loaded: {}",
            serde_json::to_string(&sanitized)
                .unwrap_or_else(|_| "[serialization error]".to_string())
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    pub fn config(&self) -> &PagekitConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Environment from `PAGEKIT_ENV`, then `APP_ENV`, defaulting to
    /// `development`.
    fn detect_environment() -> String {
        env::var("PAGEKIT_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }

    fn load_and_merge_config(directory: &Path, environment: &str) -> Result<PagekitConfig> {
        let mut merged = Self::read_yaml(&directory.join(BASE_FILE))?
            .unwrap_or(YamlValue::Mapping(Default::default()));

        let overlay_file = directory.join(format!("pagekit-{environment}.yaml"));
        if let Some(overlay) = Self::read_yaml(&overlay_file)? {
            debug!(file = %overlay_file.display(), "Applying environment overlay");
            merge_yaml(&mut merged, overlay);
        }

        serde_yaml::from_value(merged).map_err(|err| {
            DispatchError::configuration(format!("failed to deserialize configuration: {err}"))
        })
    }

    /// Read a YAML file; `Ok(None)` when it does not exist.
    fn read_yaml(path: &Path) -> Result<Option<YamlValue>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(path).map_err(|err| {
            DispatchError::configuration(format!("failed to read {}: {err}", path.display()))
        })?;
        let value = serde_yaml::from_str(&raw).map_err(|err| {
            DispatchError::configuration(format!("failed to parse {}: {err}", path.display()))
        })?;
        Ok(Some(value))
    }
}

/// Recursively merge `overlay` into `base`. Mappings merge key-wise; any
/// other overlay value replaces the base value.
fn merge_yaml(base: &mut YamlValue, overlay: YamlValue) {
    match (base, overlay) {
        (YamlValue::Mapping(base_map), YamlValue::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.entry(key) {
                    serde_yaml::mapping::Entry::Occupied(mut entry) => {
                        merge_yaml(entry.get_mut(), value);
                    }
                    serde_yaml::mapping::Entry::Vacant(entry) => {
                        entry.insert(value);
                    }
                }
            }
        }
        (base_slot, overlay_value) => *base_slot = overlay_value,
    }
}
