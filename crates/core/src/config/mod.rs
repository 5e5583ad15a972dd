//! Application configuration with layered loading.
//!
//! Configuration is loaded with figment from, in increasing precedence:
//!
//! 1. Built-in defaults
//! 2. TOML config file (if LABELGATE_CONFIG_FILE set)
//! 3. Environment variables (LABELGATE_*)

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Brave API subscription token for label search.
    ///
    /// Set via LABELGATE_BRAVE_API_KEY. Required only when a search runs.
    #[serde(default)]
    pub brave_api_key: Option<String>,

    /// Path to SQLite cache database.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Result cache entries older than this (from first write) are swept.
    #[serde(default = "default_cache_ttl_days")]
    pub cache_ttl_days: u32,

    /// Total attempts per store or search call, including the first (5 means 4 retries).
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// Interval between metrics window flushes.
    #[serde(default = "default_metrics_flush_secs")]
    pub metrics_flush_secs: u64,

    /// Interval between background cache sweeps. 0 disables the sweeper.
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,

    /// Best search score below which the fallback query is tried.
    #[serde(default = "default_search_min_score")]
    pub search_min_score: u8,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./labelgate-cache.sqlite")
}

fn default_user_agent() -> String {
    "labelgate/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_cache_ttl_days() -> u32 {
    30
}

fn default_retry_attempts() -> u32 {
    5
}

fn default_retry_base_delay_ms() -> u64 {
    250
}

fn default_retry_max_delay_ms() -> u64 {
    4_000
}

fn default_metrics_flush_secs() -> u64 {
    60
}

fn default_cleanup_interval_secs() -> u64 {
    3_600
}

fn default_search_min_score() -> u8 {
    60
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            brave_api_key: None,
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            cache_ttl_days: default_cache_ttl_days(),
            retry_attempts: default_retry_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            metrics_flush_secs: default_metrics_flush_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            search_min_score: default_search_min_score(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Retry policy shared by the caches and the search pipeline.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }

    pub fn metrics_flush_interval(&self) -> Duration {
        Duration::from_secs(self.metrics_flush_secs)
    }

    /// Sweep interval, or `None` when the sweeper is disabled.
    pub fn cleanup_interval(&self) -> Option<Duration> {
        (self.cleanup_interval_secs > 0).then(|| Duration::from_secs(self.cleanup_interval_secs))
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("LABELGATE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("LABELGATE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Check if Brave API key is available (for deferred validation).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the Brave API key is not set.
    pub fn require_brave_api_key(&self) -> Result<&str, ConfigError> {
        self.brave_api_key.as_deref().ok_or_else(|| ConfigError::Missing {
            field: "brave_api_key".into(),
            hint: "Set LABELGATE_BRAVE_API_KEY environment variable".into(),
        })
    }
}
