//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (DOCMERGE_*, `__` separates nested keys)
//! 2. TOML config file (if DOCMERGE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (DOCMERGE_*)
/// 2. TOML config file (if DOCMERGE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Durable store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Accelerator cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Deadline for one whole merge call in milliseconds.
    ///
    /// Set via DOCMERGE_PROCESS_TIMEOUT_MS environment variable.
    #[serde(default = "default_process_timeout_ms")]
    pub process_timeout_ms: u64,
}

/// SQLite store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database (`:memory:` for a throwaway store).
    ///
    /// Set via DOCMERGE_STORE__DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Seconds to wait before the first connection attempt.
    #[serde(default)]
    pub prepare_delay_secs: u64,

    /// Seconds allowed for opening and migrating the database.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

/// Which accelerator cache to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// In-process sorted sets, lost on restart.
    #[default]
    Memory,
    /// Redis sorted sets.
    Redis,
}

/// Accelerator cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackend,

    /// Redis host. Set via DOCMERGE_CACHE__HOST.
    #[serde(default = "default_cache_host")]
    pub host: String,

    /// Redis port. Set via DOCMERGE_CACHE__PORT.
    #[serde(default = "default_cache_port")]
    pub port: u16,

    /// Redis password, if the server requires one.
    #[serde(default)]
    pub password: Option<String>,

    /// Redis logical database index.
    #[serde(default)]
    pub database: i64,

    /// Seconds a URL's cached observations live after its latest write.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Prefix for every Redis key written by this process.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Seconds allowed for connecting to Redis.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Whether a failed cache write fails the whole merge call.
    #[serde(default = "default_true")]
    pub strict_writes: bool,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./docmerge.sqlite")
}

fn default_connect_timeout_secs() -> u64 {
    3
}

fn default_cache_host() -> String {
    "redis".into()
}

fn default_cache_port() -> u16 {
    6379
}

fn default_ttl_secs() -> u64 {
    300
}

fn default_key_prefix() -> String {
    "docmerge:".into()
}

fn default_process_timeout_ms() -> u64 {
    10_000
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            cache: CacheConfig::default(),
            process_timeout_ms: default_process_timeout_ms(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { db_path: default_db_path(), prepare_delay_secs: 0, connect_timeout_secs: default_connect_timeout_secs() }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            host: default_cache_host(),
            port: default_cache_port(),
            password: None,
            database: 0,
            ttl_secs: default_ttl_secs(),
            key_prefix: default_key_prefix(),
            connect_timeout_secs: default_connect_timeout_secs(),
            strict_writes: true,
        }
    }
}

impl StoreConfig {
    pub fn prepare_delay(&self) -> Duration {
        Duration::from_secs(self.prepare_delay_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl AppConfig {
    /// Merge call deadline as Duration for use with tokio.
    pub fn process_timeout(&self) -> Duration {
        Duration::from_millis(self.process_timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `DOCMERGE_`
    /// 2. TOML file from `DOCMERGE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("DOCMERGE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("DOCMERGE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
