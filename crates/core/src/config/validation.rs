//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    /// - `cache_ttl_days` or `retry_attempts` is 0
    /// - `retry_base_delay_ms` exceeds `retry_max_delay_ms`
    /// - `metrics_flush_secs` is 0
    /// - `search_min_score` exceeds 100
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.cache_ttl_days == 0 {
            return Err(invalid("cache_ttl_days", "must be greater than 0"));
        }

        if self.retry_attempts == 0 {
            return Err(invalid("retry_attempts", "must be at least 1"));
        }
        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            return Err(invalid("retry_base_delay_ms", "must not exceed retry_max_delay_ms"));
        }

        if self.metrics_flush_secs == 0 {
            return Err(invalid("metrics_flush_secs", "must be greater than 0"));
        }

        if self.search_min_score > 100 {
            return Err(invalid("search_min_score", "must be between 0 and 100"));
        }

        if self.retry_attempts == 1 {
            tracing::warn!("retry_attempts is 1; transient store failures will not be retried");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid_field(config: AppConfig) -> String {
        match config.validate() {
            Err(ConfigError::Invalid { field, .. }) => field,
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_timeout_bounds() {
        assert_eq!(invalid_field(AppConfig { timeout_ms: 50, ..Default::default() }), "timeout_ms");
        assert_eq!(invalid_field(AppConfig { timeout_ms: 301_000, ..Default::default() }), "timeout_ms");
    }

    #[test]
    fn test_validate_empty_user_agent() {
        let config = AppConfig { user_agent: String::new(), ..Default::default() };
        assert_eq!(invalid_field(config), "user_agent");
    }

    #[test]
    fn test_validate_zero_ttl() {
        let config = AppConfig { cache_ttl_days: 0, ..Default::default() };
        assert_eq!(invalid_field(config), "cache_ttl_days");
    }

    #[test]
    fn test_validate_retry_settings() {
        assert_eq!(invalid_field(AppConfig { retry_attempts: 0, ..Default::default() }), "retry_attempts");

        let config = AppConfig { retry_base_delay_ms: 5_000, retry_max_delay_ms: 1_000, ..Default::default() };
        assert_eq!(invalid_field(config), "retry_base_delay_ms");
    }

    #[test]
    fn test_validate_flush_and_score() {
        assert_eq!(invalid_field(AppConfig { metrics_flush_secs: 0, ..Default::default() }), "metrics_flush_secs");
        assert_eq!(invalid_field(AppConfig { search_min_score: 101, ..Default::default() }), "search_min_score");
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = AppConfig {
            timeout_ms: 100,
            retry_attempts: 1,
            retry_base_delay_ms: 4_000,
            retry_max_delay_ms: 4_000,
            search_min_score: 100,
            cleanup_interval_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
