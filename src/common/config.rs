//! Configuration for fitforum clients

use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "FITFORUM_CONFIG";

/// Config file used when `FITFORUM_CONFIG` is unset
pub const DEFAULT_CONFIG_PATH: &str = "fitforum.toml";

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Forum REST API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Vote reconciliation settings
    #[serde(default)]
    pub votes: VoteConfig,

    /// Request cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            votes: VoteConfig::default(),
            cache: CacheConfig::default(),
            log_level: default_log_level(),
        }
    }
}

/// REST API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the backend, e.g. `http://localhost:5000/api`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Bearer token forwarded on every request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}
fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
            auth_token: None,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.timeout_ms = u64::try_from(timeout.as_millis())
            .map_err(|_| Error::InvalidConfig(format!("timeout too large: {:?}", timeout)))?;
        Ok(())
    }
}

/// How vote counters move when a voter switches direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterPolicy {
    /// Bump the chosen counter only; a switch never decrements the old one.
    #[default]
    IncrementOnly,
    /// Move the voter's previous vote to the new counter; repeats are no-ops.
    Symmetric,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoteConfig {
    #[serde(default)]
    pub counter_policy: CounterPolicy,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Age after which a settled entry is refetched on the next read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale_after_ms: Option<u64>,
}

impl CacheConfig {
    pub fn stale_after(&self) -> Option<Duration> {
        self.stale_after_ms.map(Duration::from_millis)
    }
}

impl Config {
    /// Load from `FITFORUM_CONFIG` (or `fitforum.toml`), then `FITFORUM_*` env vars
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from(&path)
    }

    /// Load from an explicit file; a missing file falls back to defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix("FITFORUM")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(Error::InvalidConfig("api.base_url cannot be empty".into()));
        }
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            return Err(Error::InvalidConfig(format!(
                "api.base_url must be an http(s) URL: {}",
                self.api.base_url
            )));
        }
        if self.api.timeout_ms == 0 {
            return Err(Error::InvalidConfig("api.timeout_ms must be positive".into()));
        }
        Ok(())
    }
}
