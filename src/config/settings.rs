//! Settings loaded from a JSON file with environment overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed settings file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Missing required setting: {0}")]
    Missing(&'static str),
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

/// Runtime configuration for the assistant service and the record store.
///
/// Values come from `settings.json` in the config directory, with
/// `SOUSCHEF_*` environment variables taking precedence over the file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    /// Assistant service API key.
    pub api_key: Option<String>,
    /// Id of the assistant that drives runs.
    pub assistant_id: Option<String>,
    /// Assistant service base URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Model used for recipe drafting.
    #[serde(default = "default_model")]
    pub model: String,
    /// Record store base URL, including the base path.
    pub store_base: Option<String>,
    /// Record store API key.
    pub store_key: Option<String>,
    /// Keep records in memory instead of the hosted store.
    pub offline: bool,
}

impl Settings {
    /// Load from `path` if it exists, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let mut settings = if path.is_file() {
            let raw = std::fs::read_to_string(path)?;
            serde_json::from_str(&raw)?
        } else {
            debug!(path = %path.display(), "No settings file, using defaults");
            Self {
                api_base: default_api_base(),
                model: default_model(),
                ..Self::default()
            }
        };
        settings.apply_env();
        Ok(settings)
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("SOUSCHEF_API_KEY") {
            self.api_key = Some(v);
        }
        if let Ok(v) = std::env::var("SOUSCHEF_ASSISTANT_ID") {
            self.assistant_id = Some(v);
        }
        if let Ok(v) = std::env::var("SOUSCHEF_API_BASE") {
            self.api_base = v;
        }
        if let Ok(v) = std::env::var("SOUSCHEF_MODEL") {
            self.model = v;
        }
        if let Ok(v) = std::env::var("SOUSCHEF_STORE_BASE") {
            self.store_base = Some(v);
        }
        if let Ok(v) = std::env::var("SOUSCHEF_STORE_KEY") {
            self.store_key = Some(v);
        }
        if let Ok(v) = std::env::var("SOUSCHEF_OFFLINE") {
            self.offline = matches!(v.to_lowercase().as_str(), "true" | "1" | "yes" | "on");
        }
    }

    /// The API key, or an error naming the missing setting.
    pub fn require_api_key(&self) -> Result<&str, SettingsError> {
        self.api_key
            .as_deref()
            .ok_or(SettingsError::Missing("api_key"))
    }

    /// The assistant id, or an error naming the missing setting.
    pub fn require_assistant_id(&self) -> Result<&str, SettingsError> {
        self.assistant_id
            .as_deref()
            .ok_or(SettingsError::Missing("assistant_id"))
    }

    /// Store credentials when both are configured.
    pub fn store_credentials(&self) -> Option<(&str, &str)> {
        match (self.store_base.as_deref(), self.store_key.as_deref()) {
            (Some(base), Some(key)) => Some((base, key)),
            _ => None,
        }
    }
}
