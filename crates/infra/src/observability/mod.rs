//! Tracing subscriber setup
//!
//! `RUST_LOG`, when set, replaces the configured level directive.

use storeguard_domain::{LoggingConfig, Result, StoreGuardError};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Build the level filter for `config`.
///
/// # Errors
/// Returns `StoreGuardError::Config` if the configured directive is invalid.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directive) if !directive.trim().is_empty() => EnvFilter::try_new(directive)
            .map_err(|e| StoreGuardError::Config(format!("invalid RUST_LOG: {e}"))),
        _ => EnvFilter::try_new(&config.level)
            .map_err(|e| StoreGuardError::Config(format!("invalid logging.level: {e}"))),
    }
}

/// Install the global subscriber. Call once at startup.
///
/// # Errors
/// Returns `StoreGuardError::Config` for an invalid level directive and
/// `StoreGuardError::Internal` if a global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = env_filter(config)?;

    let result = if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_current_span(false))
            .try_init()
    } else {
        tracing_subscriber::registry().with(filter).with(fmt::layer().with_target(true)).try_init()
    };

    result.map_err(|e| StoreGuardError::Internal(format!("tracing already initialised: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_level_is_a_config_error() {
        if std::env::var(EnvFilter::DEFAULT_ENV).is_ok() {
            return;
        }
        let config = LoggingConfig { level: "storeguard=verbose".into(), json: false };
        assert!(matches!(env_filter(&config), Err(StoreGuardError::Config(_))));
    }

    #[test]
    fn second_init_reports_error() {
        let config = LoggingConfig { level: "warn".into(), json: true };
        let first = init_tracing(&config);
        let second = init_tracing(&config);

        assert!(first.is_ok() || matches!(first, Err(StoreGuardError::Internal(_))));
        assert!(matches!(second, Err(StoreGuardError::Internal(_))));
    }
}
