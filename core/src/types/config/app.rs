use crate::error::ValidationError;
use crate::types::duration::parse_duration;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// User-facing vault configuration, persisted as config.toml.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub vault: VaultSettings,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
}

impl AppConfig {
    /// Returns the config file path within the given data directory.
    pub fn path(data_dir: &Path) -> std::path::PathBuf {
        data_dir.join("config.toml")
    }

    /// Loads config from a TOML file. Returns default config if file doesn't exist.
    pub fn load(path: &Path) -> Result<Self, AppConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Saves config to a TOML file.
    pub fn save(&self, path: &Path) -> Result<(), AppConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validates config values and returns list of validation errors.
    /// Returns empty vec if config is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.vault.namespace_prefix.trim().is_empty() {
            errors.push("namespace_prefix must not be empty".to_string());
        }

        if self.vault.page_size == 0 {
            errors.push("page_size must be at least 1".to_string());
        }

        if let Err(e) = parse_duration(&self.lifecycle.retention) {
            errors.push(format!("retention: {e}"));
        }

        match parse_duration(&self.lifecycle.maintenance_interval) {
            Ok(interval) if interval.is_zero() => {
                errors.push("maintenance_interval must be positive".to_string());
            }
            Ok(_) => {}
            Err(e) => errors.push(format!("maintenance_interval: {e}")),
        }

        errors
    }

    /// Returns a validated config, replacing invalid values with defaults.
    pub fn with_defaults_for_invalid(&self) -> Self {
        let defaults = Self::default();
        let valid_duration = |value: &str, fallback: &str| match parse_duration(value) {
            Ok(d) if !d.is_zero() => value.to_string(),
            _ => fallback.to_string(),
        };

        Self {
            vault: VaultSettings {
                namespace_prefix: if self.vault.namespace_prefix.trim().is_empty() {
                    defaults.vault.namespace_prefix
                } else {
                    self.vault.namespace_prefix.clone()
                },
                page_size: if self.vault.page_size == 0 {
                    defaults.vault.page_size
                } else {
                    self.vault.page_size
                },
            },
            lifecycle: LifecycleConfig {
                retention: valid_duration(&self.lifecycle.retention, &defaults.lifecycle.retention),
                maintenance_interval: valid_duration(
                    &self.lifecycle.maintenance_interval,
                    &defaults.lifecycle.maintenance_interval,
                ),
            },
        }
    }
}

/// Vault-wide settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VaultSettings {
    #[serde(default = "default_namespace_prefix")]
    pub namespace_prefix: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            namespace_prefix: default_namespace_prefix(),
            page_size: default_page_size(),
        }
    }
}

fn default_namespace_prefix() -> String {
    "T3VO".to_string()
}

fn default_page_size() -> usize {
    10
}

/// Retention and maintenance settings, as duration strings (`90d`, `24h`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LifecycleConfig {
    #[serde(default = "default_retention")]
    pub retention: String,
    #[serde(default = "default_maintenance_interval")]
    pub maintenance_interval: String,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            retention: default_retention(),
            maintenance_interval: default_maintenance_interval(),
        }
    }
}

fn default_retention() -> String {
    "90d".to_string()
}

fn default_maintenance_interval() -> String {
    "24h".to_string()
}

/// Errors that can occur when loading or saving config.
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid value: {0}")]
    Invalid(#[from] ValidationError),
}
