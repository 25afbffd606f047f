//! Configuration - TOML file plus environment overrides
//!
//! ```toml
//! validation = "checked"
//!
//! [log]
//! level = "debug"
//! json = false
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Whether the executor verifies blocks before entering native code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// No per-call checks; a mismatched block is undefined behavior
    Unchecked,
    /// Compare block size and layout fingerprint before every call
    Checked,
}

impl Default for ValidationMode {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Checked
        } else {
            Self::Unchecked
        }
    }
}

impl std::str::FromStr for ValidationMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "checked" | "on" | "1" | "true" => Ok(Self::Checked),
            "unchecked" | "off" | "0" | "false" => Ok(Self::Unchecked),
            _ => Err(ConfigError::InvalidValue {
                key: "validation",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub validation: ValidationMode,

    #[serde(default)]
    pub log: LogSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String,

    /// Daily-rotated log file; console when absent
    #[serde(default)]
    pub file: Option<String>,

    #[serde(default = "default_false")]
    pub json: bool,

    #[serde(default = "default_false")]
    pub spans: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file: None,
            json: false,
            spans: false,
        }
    }
}

impl LogSettings {
    /// Defaults with `FASTFFI_LOG_*` overrides; never fails
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        settings.apply_vars(&|key: &str| std::env::var(key).ok());
        settings
    }

    fn apply_vars(&mut self, var: &impl Fn(&str) -> Option<String>) {
        if let Some(level) = var("FASTFFI_LOG_LEVEL") {
            self.level = level.to_lowercase();
        }
        if let Some(path) = var("FASTFFI_LOG_FILE") {
            self.file = Some(path);
        }
        if var("FASTFFI_LOG_JSON").is_some() {
            self.json = true;
        }
        if var("FASTFFI_LOG_SPANS").is_some() {
            self.spans = true;
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_false() -> bool {
    false
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Apply `FASTFFI_*` variables on top of the current values
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        // Log settings apply even when the validation value is bad
        self.log.apply_vars(&var);
        if let Some(mode) = var("FASTFFI_VALIDATION") {
            self.validation = mode.parse()?;
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
