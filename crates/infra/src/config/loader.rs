//! Configuration loader
//!
//! ## Loading Strategy
//! 1. Start from a config file if one is found (TOML or JSON), otherwise
//!    from built-in defaults
//! 2. Apply environment variables on top; a set variable always wins
//!
//! Breaker overrides are only read from the file's `[breakers.<name>]`
//! tables.
//!
//! ## Environment Variables
//! - `STOREGUARD_DB_PATH`: Database file path
//! - `STOREGUARD_DB_POOL_SIZE`: Connection pool size
//! - `STOREGUARD_HTTP_TIMEOUT_MS`: Default outbound HTTP deadline
//! - `STOREGUARD_LOG_LEVEL`: `EnvFilter` directive
//! - `STOREGUARD_LOG_JSON`: Emit JSON logs (true/false)
//!
//! ## File Locations
//! The loader probes, in order, `config.{toml,json}` and
//! `storeguard.{toml,json}` in the working directory and its two parents,
//! then the same names next to the executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use storeguard_domain::{Result, StoreGuardConfig, StoreGuardError};

pub const ENV_DB_PATH: &str = "STOREGUARD_DB_PATH";
pub const ENV_DB_POOL_SIZE: &str = "STOREGUARD_DB_POOL_SIZE";
pub const ENV_HTTP_TIMEOUT_MS: &str = "STOREGUARD_HTTP_TIMEOUT_MS";
pub const ENV_LOG_LEVEL: &str = "STOREGUARD_LOG_LEVEL";
pub const ENV_LOG_JSON: &str = "STOREGUARD_LOG_JSON";

const CONFIG_FILE_NAMES: [&str; 4] =
    ["config.toml", "config.json", "storeguard.toml", "storeguard.json"];

/// Load configuration from the first config file found, then apply
/// environment variables.
///
/// With no file and no variables the built-in defaults are returned.
///
/// # Errors
/// Returns `StoreGuardError::Config` if a file is unreadable or malformed, or
/// a variable has an invalid value.
pub fn load() -> Result<StoreGuardConfig> {
    let mut config = match probe_config_paths() {
        Some(path) => load_from_file(Some(path))?,
        None => {
            tracing::debug!("no config file found, using defaults");
            StoreGuardConfig::default()
        }
    };

    apply_env_overrides(&mut config)?;
    validate(&config)?;
    Ok(config)
}

/// Load configuration from environment variables alone.
///
/// `STOREGUARD_DB_PATH` is required; every other value falls back to its
/// default.
///
/// # Errors
/// Returns `StoreGuardError::Config` if the database path is missing or a
/// variable has an invalid value.
pub fn load_from_env() -> Result<StoreGuardConfig> {
    env_var(ENV_DB_PATH)?;

    let mut config = StoreGuardConfig::default();
    apply_env_overrides(&mut config)?;
    validate(&config)?;

    tracing::info!("Configuration loaded from environment variables");
    Ok(config)
}

/// Load configuration from a file.
///
/// If `path` is `None`, probes the standard locations.
///
/// # Errors
/// Returns `StoreGuardError::Config` if the file is missing, unreadable, or
/// malformed.
pub fn load_from_file(path: Option<PathBuf>) -> Result<StoreGuardConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(StoreGuardError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            StoreGuardError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| StoreGuardError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, &config_path)
}

fn parse_config(contents: &str, path: &Path) -> Result<StoreGuardConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| StoreGuardError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| StoreGuardError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(StoreGuardError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// First existing config file among the standard locations.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.push(exe_dir.to_path_buf());
        }
    }

    roots
        .iter()
        .flat_map(|root| CONFIG_FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

fn apply_env_overrides(config: &mut StoreGuardConfig) -> Result<()> {
    if let Ok(path) = std::env::var(ENV_DB_PATH) {
        config.database.path = path;
    }
    if let Some(pool_size) = env_parse::<u32>(ENV_DB_POOL_SIZE)? {
        config.database.pool_size = pool_size;
    }
    if let Some(timeout_ms) = env_parse::<u64>(ENV_HTTP_TIMEOUT_MS)? {
        config.http.timeout_ms = timeout_ms;
    }
    if let Ok(level) = std::env::var(ENV_LOG_LEVEL) {
        config.logging.level = level;
    }
    config.logging.json = env_bool(ENV_LOG_JSON, config.logging.json);
    Ok(())
}

fn validate(config: &StoreGuardConfig) -> Result<()> {
    if config.database.path.trim().is_empty() {
        return Err(StoreGuardError::Config("database.path must not be empty".into()));
    }
    if config.database.pool_size == 0 {
        return Err(StoreGuardError::Config("database.pool_size must be at least 1".into()));
    }
    if config.http.timeout_ms == 0 {
        return Err(StoreGuardError::Config("http.timeout_ms must be greater than 0".into()));
    }
    Ok(())
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        StoreGuardError::Config(format!("Missing required environment variable: {}", key))
    })
}

/// Parse an optional environment variable; unset yields `None`.
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| StoreGuardError::Config(format!("Invalid {}: {}", key, e))),
        Err(_) => Ok(None),
    }
}

/// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
