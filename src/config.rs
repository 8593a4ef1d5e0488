//! Client configuration.
//!
//! Layered: defaults → `taskboard.toml` → environment → CLI flags.
//!
//! # Configuration File Format
//!
//! ```toml
//! [api]
//! url = "http://localhost:8000"
//! request_timeout_secs = 10
//!
//! [push]
//! url = "ws://localhost:8000"
//! reconnect = true
//! initial_backoff_ms = 1000
//! max_backoff_ms = 30000
//! max_attempts = 0        # 0 = unlimited
//!
//! [storage]
//! state_dir = "~/.local/share/taskboard"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Name of the config file looked up in the working directory.
pub const CONFIG_FILE: &str = "taskboard.toml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    #[serde(default = "default_api_url")]
    pub url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_api_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: default_api_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushConfig {
    #[serde(default = "default_push_url")]
    pub url: String,
    /// Reconnect after the connection drops
    #[serde(default = "default_reconnect")]
    pub reconnect: bool,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Give up after this many failed attempts; 0 retries forever
    #[serde(default)]
    pub max_attempts: u32,
}

fn default_push_url() -> String {
    "ws://localhost:8000".to_string()
}

fn default_reconnect() -> bool {
    true
}

fn default_initial_backoff_ms() -> u64 {
    1_000
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            url: default_push_url(),
            reconnect: default_reconnect(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            max_attempts: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// Where the credential and auth state live
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub push: PushConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Values given on the command line; `None` leaves the lower layer alone.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub api_url: Option<String>,
    pub ws_url: Option<String>,
    pub state_dir: Option<PathBuf>,
}

impl ClientConfig {
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Resolve the full layered configuration. An explicit `path` must
    /// exist; otherwise `taskboard.toml` in the working directory is used
    /// when present.
    pub fn load(path: Option<&Path>, cli: &CliOverrides) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_file(path)?,
            None => {
                let local = Path::new(CONFIG_FILE);
                if local.exists() {
                    Self::load_file(local)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.apply_cli(cli);
        config.validate()?;
        Ok(config)
    }

    /// Apply `TASKBOARD_*` variables through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(url) = lookup("TASKBOARD_API_URL") {
            self.api.url = url;
        }
        if let Some(url) = lookup("TASKBOARD_WS_URL") {
            self.push.url = url;
        }
        if let Some(dir) = lookup("TASKBOARD_STATE_DIR") {
            self.storage.state_dir = Some(PathBuf::from(dir));
        }
        if let Some(secs) = lookup("TASKBOARD_REQUEST_TIMEOUT_SECS") {
            self.api.request_timeout_secs = secs.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!(
                    "TASKBOARD_REQUEST_TIMEOUT_SECS must be a whole number of seconds, got '{}'",
                    secs
                ))
            })?;
        }
        Ok(())
    }

    pub fn apply_cli(&mut self, cli: &CliOverrides) {
        if let Some(url) = &cli.api_url {
            self.api.url = url.clone();
        }
        if let Some(url) = &cli.ws_url {
            self.push.url = url.clone();
        }
        if let Some(dir) = &cli.state_dir {
            self.storage.state_dir = Some(dir.clone());
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let api_url = self.api.url.trim();
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "api.url must start with http:// or https://, got '{}'",
                self.api.url
            )));
        }
        let push_url = self.push.url.trim();
        if !(push_url.starts_with("ws://") || push_url.starts_with("wss://")) {
            return Err(ConfigError::Invalid(format!(
                "push.url must start with ws:// or wss://, got '{}'",
                self.push.url
            )));
        }
        if self.api.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "api.request_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.push.initial_backoff_ms == 0 {
            return Err(ConfigError::Invalid(
                "push.initial_backoff_ms must be greater than 0".to_string(),
            ));
        }
        if self.push.initial_backoff_ms > self.push.max_backoff_ms {
            return Err(ConfigError::Invalid(format!(
                "push.initial_backoff_ms ({}) exceeds push.max_backoff_ms ({})",
                self.push.initial_backoff_ms, self.push.max_backoff_ms
            )));
        }
        Ok(())
    }

    /// The state directory: configured (with `~` expanded), else the
    /// platform data dir, else `.taskboard` in the working directory.
    pub fn state_dir(&self) -> PathBuf {
        match &self.storage.state_dir {
            Some(dir) => expand_home(dir),
            None => dirs::data_local_dir()
                .map(|d| d.join("taskboard"))
                .unwrap_or_else(|| PathBuf::from(".taskboard")),
        }
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Invalid(format!("Failed to serialize config: {}", e)))
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}
