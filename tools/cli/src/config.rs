//! CLI configuration: which adapter to use and where state lives.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory under the platform config dir holding mdstore files.
const APP_DIR: &str = "mdstore";

/// Adapter selection, read from `config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Registry name of the adapter ("local", "dropbox", "memory").
    pub provider: String,
    /// Adapter-specific configuration.
    #[serde(default)]
    pub provider_config: serde_json::Value,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            provider: "local".to_string(),
            provider_config: serde_json::Value::Null,
        }
    }
}

impl CliConfig {
    /// Load configuration. A missing file selects the local adapter.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text)
                .with_context(|| format!("Invalid config file {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }
}

fn app_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

pub fn default_config_path() -> PathBuf {
    app_dir().join("config.json")
}

pub fn default_session_path() -> PathBuf {
    app_dir().join("session.json")
}
