//! Engine configuration.
//!
//! Defaults match the long-running deployment values; everything can be
//! overridden from TOML or tweaked through the builder methods.

use crate::retention::RetentionPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Error raised while loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// TOML input failed to parse or deserialize.
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Parse(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Retry budget for store operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per logical operation (first try included).
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each subsequent one.
    pub base_delay_ms: u64,
    /// Ceiling on any single backoff delay.
    pub max_delay_ms: u64,
    /// Add random jitter on top of the computed delay.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2_000,
            jitter: true,
        }
    }
}

/// Read-cache sizing and freshness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How long a cached snapshot may be served.
    pub freshness_ms: u64,
    /// Hard ceiling on cached scopes; oldest entries are evicted beyond it.
    pub capacity: usize,
    /// Cache size at which an insert also sweeps stale entries.
    pub sweep_threshold: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            freshness_ms: 60_000,
            capacity: 4_096,
            sweep_threshold: 1_024,
        }
    }
}

impl CacheConfig {
    pub fn freshness(&self) -> Duration {
        Duration::from_millis(self.freshness_ms)
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Connection URL for the counter store.
    pub store_url: String,
    /// Maximum entries kept in each per-domain log list.
    pub log_max_len: i64,
    /// TTL policy for day- and hour-scoped keys.
    pub retention: RetentionPolicy,
    pub cache: CacheConfig,
    pub retry: RetryConfig,
    /// Seconds between background liveness probes against the store.
    pub health_probe_interval_secs: u64,
    /// Allow the administrative full-store wipe. Leave off in production.
    pub enable_wipe: bool,
}

impl Default for StatsConfig {
    fn default() -> Self {
        StatsConfig {
            store_url: "redis://127.0.0.1:6379".to_string(),
            log_max_len: 1_000,
            retention: RetentionPolicy::default(),
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
            health_probe_interval_secs: 30,
            enable_wipe: false,
        }
    }
}

impl StatsConfig {
    /// Defaults, with the store URL taken from `REDIS_URL` when set.
    pub fn from_env() -> Self {
        let mut config = StatsConfig::default();
        if let Ok(url) = std::env::var("REDIS_URL") {
            if !url.is_empty() {
                config.store_url = url;
            }
        }
        config
    }

    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn with_store_url(mut self, url: &str) -> Self {
        self.store_url = url.to_string();
        self
    }

    pub fn with_log_max_len(mut self, len: i64) -> Self {
        self.log_max_len = len;
        self
    }

    pub fn with_wipe_enabled(mut self) -> Self {
        self.enable_wipe = true;
        self
    }

    pub fn health_probe_interval(&self) -> Duration {
        Duration::from_secs(self.health_probe_interval_secs)
    }
}
