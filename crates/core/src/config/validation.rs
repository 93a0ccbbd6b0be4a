//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::{AppConfig, CacheBackend};
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

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `store.db_path` is empty
    /// - a connect timeout is outside 1..=300 seconds
    /// - `cache.port` or `cache.ttl_secs` is 0
    /// - `process_timeout_ms` is less than 100ms or exceeds 5 minutes
    ///
    /// Returns `ConfigError::Missing` if the Redis backend is selected without a host.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.db_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid { field: "store.db_path".into(), reason: "must not be empty".into() });
        }

        for (field, secs) in [
            ("store.connect_timeout_secs", self.store.connect_timeout_secs),
            ("cache.connect_timeout_secs", self.cache.connect_timeout_secs),
        ] {
            if !(1..=300).contains(&secs) {
                return Err(ConfigError::Invalid { field: field.into(), reason: "must be between 1 and 300".into() });
            }
        }

        if self.cache.port == 0 {
            return Err(ConfigError::Invalid { field: "cache.port".into(), reason: "must be greater than 0".into() });
        }
        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::Invalid { field: "cache.ttl_secs".into(), reason: "must be greater than 0".into() });
        }
        if self.cache.backend == CacheBackend::Redis && self.cache.host.is_empty() {
            return Err(ConfigError::Missing {
                field: "cache.host".into(),
                hint: "Set DOCMERGE_CACHE__HOST environment variable".into(),
            });
        }

        if self.process_timeout_ms < 100 {
            return Err(ConfigError::Invalid {
                field: "process_timeout_ms".into(),
                reason: "must be at least 100ms".into(),
            });
        }
        if self.process_timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "process_timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.cache.backend == CacheBackend::Memory && self.cache.password.is_some() {
            tracing::warn!("cache.password is set but the memory cache backend ignores it");
        }

        Ok(())
    }
}
