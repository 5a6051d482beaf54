use crate::FormatTag;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub listener: ListenerConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.listener.validate()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendPreference {
    /// Wayland when the session looks like Wayland, generic otherwise.
    Auto,
    Generic,
    /// Try Wayland even without session hints; still falls back to generic.
    Wayland,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ListenerConfig {
    pub backend: BackendPreference,
    /// Also report primary-selection changes (Wayland data-control v2).
    pub watch_primary: bool,
    /// Format identifiers read into `ClipboardData::other` when present.
    pub custom_formats: Vec<String>,
    /// Preferred MIME types, most preferred first.
    pub mime_priority: Vec<String>,
    pub transfer_timeout_ms: u64,
    pub max_payload_bytes: usize,
    pub stop_timeout_ms: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            backend: BackendPreference::Auto,
            watch_primary: false,
            custom_formats: Vec::new(),
            mime_priority: vec![
                "text/plain;charset=utf-8".to_string(),
                "text/plain".to_string(),
                "text/html".to_string(),
                "image/png".to_string(),
                "image/jpeg".to_string(),
            ],
            transfer_timeout_ms: 1000,
            max_payload_bytes: 64 * 1024 * 1024,
            stop_timeout_ms: 2000,
        }
    }
}

impl ListenerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.transfer_timeout_ms == 0 {
            bail!("listener.transfer_timeout_ms must be greater than zero");
        }
        if self.stop_timeout_ms == 0 {
            bail!("listener.stop_timeout_ms must be greater than zero");
        }
        if self.max_payload_bytes == 0 {
            bail!("listener.max_payload_bytes must be greater than zero");
        }
        for name in &self.custom_formats {
            if name.trim().is_empty() {
                bail!("listener.custom_formats contains an empty identifier");
            }
            if FormatTag::builtin(name).is_some() {
                bail!("listener.custom_formats entry '{}' shadows a built-in format", name);
            }
        }
        Ok(())
    }

    pub fn custom_tags(&self) -> Vec<FormatTag> {
        self.custom_formats
            .iter()
            .map(|name| FormatTag::Custom(name.clone()))
            .collect()
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_millis(self.transfer_timeout_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `clipwatch_listener=debug`.
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}
