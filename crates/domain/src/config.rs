//! Configuration structures
//!
//! Deserialized from TOML or JSON by the infra loader. Every section except
//! `database` has defaults, so a minimal file only needs the database path.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BACKOFF_FACTOR, DEFAULT_DB_PATH, DEFAULT_DB_POOL_SIZE, DEFAULT_HTTP_TIMEOUT_MS,
    DEFAULT_INITIAL_DELAY_MS, DEFAULT_LOG_LEVEL, DEFAULT_MAX_DELAY_MS, DEFAULT_MAX_RETRIES,
};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreGuardConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub retry: RetryDefaults,
    /// Per-dependency breaker overrides keyed by breaker name
    #[serde(default)]
    pub breakers: BTreeMap<String, BreakerOverride>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// SQLite database holding the dead-letter queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: DEFAULT_DB_PATH.to_string(), pool_size: DEFAULT_DB_POOL_SIZE }
    }
}

fn default_pool_size() -> u32 {
    DEFAULT_DB_POOL_SIZE
}

/// Outbound HTTP invoker settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_ms: DEFAULT_HTTP_TIMEOUT_MS }
    }
}

fn default_http_timeout_ms() -> u64 {
    DEFAULT_HTTP_TIMEOUT_MS
}

/// Default retry policy applied when a caller does not supply its own
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryDefaults {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_factor: f64,
}

impl Default for RetryDefaults {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
        }
    }
}

/// Partial breaker configuration; unset fields keep the built-in default for
/// the dependency.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerOverride {
    pub timeout_ms: Option<u64>,
    pub error_threshold_percentage: Option<u8>,
    pub reset_timeout_ms: Option<u64>,
    pub volume_threshold: Option<u32>,
    pub rolling_window_ms: Option<u64>,
}

impl BreakerOverride {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Tracing subscriber settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `storeguard_core=debug`
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: DEFAULT_LOG_LEVEL.to_string(), json: false }
    }
}
