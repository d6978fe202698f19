//! Configuration system for Iris.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $IRIS_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/iris/config.toml
//!   3. ~/.config/iris/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::wire::DEFAULT_CHANNEL;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IrisConfig {
    pub network: NetworkConfig,
    pub peers: PeerConfig,
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// TCP listen port. 0 = OS-assigned.
    pub port: u16,
    /// Channel name. Only peers on the same channel keep their connections.
    pub channel: String,
    /// "host:port" addresses to dial after joining.
    pub bootstrap: Vec<String>,
    /// Seconds between redial attempts to a bootstrap address.
    pub redial_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerConfig {
    /// Keep-alive probe interval for connections we initiate.
    pub keepalive_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Read messages from stdin. Disabled for headless runs.
    pub interactive: bool,
    pub prompt: String,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: 0,
            channel: DEFAULT_CHANNEL.to_string(),
            bootstrap: Vec::new(),
            redial_interval_secs: 3,
        }
    }
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            keepalive_interval_ms: 600,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            interactive: true,
            prompt: "Message: ".to_string(),
        }
    }
}

impl PeerConfig {
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms)
    }
}

impl NetworkConfig {
    pub fn redial_interval(&self) -> Duration {
        Duration::from_secs(self.redial_interval_secs.max(1))
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("iris")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl IrisConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            IrisConfig::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("IRIS_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&IrisConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply overrides from an environment lookup.
    ///
    /// `PORT` and `NO_READLINE` are honoured alongside the `IRIS_*` keys so
    /// existing launch scripts keep working. `NO_READLINE` disables the
    /// prompt whenever it is set, whatever its value.
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        for key in ["PORT", "IRIS_NETWORK__PORT"] {
            if let Some(p) = var(key).and_then(|v| v.trim().parse().ok()) {
                self.network.port = p;
            }
        }
        if let Some(v) = var("IRIS_NETWORK__CHANNEL") {
            self.network.channel = v;
        }
        if let Some(v) = var("IRIS_NETWORK__BOOTSTRAP") {
            self.network.bootstrap = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = var("IRIS_UI__INTERACTIVE") {
            self.ui.interactive = v == "true" || v == "1";
        }
        if var("NO_READLINE").is_some() {
            self.ui.interactive = false;
        }
    }
}
