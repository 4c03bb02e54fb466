//! Layered configuration: defaults, then an optional JSON file, then CLI
//! arguments/env vars — the same merge order `core::config` in the teacher
//! repo uses for its much larger `AppConfig`, trimmed here to what this
//! subsystem needs: PII redaction policy and debug/logging flags.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::core::constants::{self, DEFAULT_PII_BEARING_KEYS, PII_REDACTION_MAX_ATTRIBUTE_LENGTH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PiiRedactionLevel {
    Disabled,
    Essential,
    Strict,
}

impl Default for PiiRedactionLevel {
    fn default() -> Self {
        PiiRedactionLevel::Essential
    }
}

/// On-disk configuration shape, every field optional so a partial file only
/// overrides what it mentions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PiiFileConfig {
    pub level: Option<PiiRedactionLevel>,
    pub max_attribute_length: Option<usize>,
    pub bearing_keys: Option<Vec<String>>,
    pub backend_configured: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub pii: PiiFileConfig,
    pub debug: Option<bool>,
}

impl FileConfig {
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let parsed: Self = serde_json::from_str(&contents)?;
        Ok(parsed)
    }

    /// Field-by-field deep merge, `other` winning on anything it sets.
    pub fn merge(mut self, other: FileConfig) -> Self {
        if other.pii.level.is_some() {
            self.pii.level = other.pii.level;
        }
        if other.pii.max_attribute_length.is_some() {
            self.pii.max_attribute_length = other.pii.max_attribute_length;
        }
        if other.pii.bearing_keys.is_some() {
            self.pii.bearing_keys = other.pii.bearing_keys;
        }
        if other.pii.backend_configured.is_some() {
            self.pii.backend_configured = other.pii.backend_configured;
        }
        if other.debug.is_some() {
            self.debug = other.debug;
        }
        self
    }
}

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct PiiConfig {
    pub level: PiiRedactionLevel,
    pub max_attribute_length: usize,
    pub bearing_keys: Vec<String>,
    pub backend_configured: bool,
    pub is_production: bool,
}

impl Default for PiiConfig {
    fn default() -> Self {
        Self {
            level: PiiRedactionLevel::default(),
            max_attribute_length: PII_REDACTION_MAX_ATTRIBUTE_LENGTH,
            bearing_keys: DEFAULT_PII_BEARING_KEYS.iter().map(|s| s.to_string()).collect(),
            backend_configured: false,
            is_production: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub pii: PiiConfig,
    pub debug: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            pii: PiiConfig::default(),
            debug: false,
        }
    }
}

impl AppConfig {
    /// Layering order: 1. defaults, 2. JSON config file if present, 3. env
    /// vars. `config_path` overrides the default `spancanon.json` lookup in
    /// the current directory.
    pub fn load(config_path: Option<&Path>) -> anyhow::Result<Self> {
        let mut file_config = FileConfig::default();

        let candidate = config_path
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(constants::CONFIG_FILE_NAME));
        if candidate.exists() {
            file_config = file_config.merge(FileConfig::load_from_file(&candidate)?);
        }

        let mut config = AppConfig::default();
        if let Some(level) = file_config.pii.level {
            config.pii.level = level;
        }
        if let Some(max_len) = file_config.pii.max_attribute_length {
            config.pii.max_attribute_length = max_len;
        }
        if let Some(keys) = file_config.pii.bearing_keys {
            config.pii.bearing_keys = keys;
        }
        if let Some(configured) = file_config.pii.backend_configured {
            config.pii.backend_configured = configured;
        }
        if let Some(debug) = file_config.debug {
            config.debug = debug;
        }

        if std::env::var(constants::ENV_DEBUG).is_ok() {
            config.debug = true;
        }
        config.pii.is_production = std::env::var(constants::ENV_NODE_ENV)
            .map(|v| v == "production")
            .unwrap_or(false);

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.pii.max_attribute_length == 0 {
            anyhow::bail!("pii.max_attribute_length must be non-zero");
        }
        Ok(())
    }
}
