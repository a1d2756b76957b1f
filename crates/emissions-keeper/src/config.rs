//! Keeper configuration loaded from TOML.

use anyhow::{bail, Context, Result};
use emissions_storage::StorageConfig;
use emissions_types::ModuleParams;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Shipped defaults, used when no file is given.
pub const DEFAULT_CONFIG: &str = include_str!("../../../config/emissions.toml");

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `pretty` or `json`.
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub module_filters: BTreeMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            module_filters: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EmissionsConfig {
    #[serde(default)]
    pub params: ModuleParams,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl EmissionsConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))?;

        info!(path = %path.display(), "⚙️ Configuration loaded");
        Ok(config)
    }

    /// Parses, applies environment overrides and validates.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let mut config: EmissionsConfig =
            toml::from_str(contents).context("Failed to parse emissions config")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn load_default() -> Result<Self> {
        Self::from_toml_str(DEFAULT_CONFIG)
    }

    /// `EMISSIONS_LOG_LEVEL` and `EMISSIONS_LOG_FORMAT` take precedence over the file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("EMISSIONS_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("EMISSIONS_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.params.validate()?;

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => bail!("Unknown log level '{}'", other),
        }
        match self.logging.format.as_str() {
            "pretty" | "json" => {}
            other => bail!("Unknown log format '{}'", other),
        }
        Ok(())
    }
}
