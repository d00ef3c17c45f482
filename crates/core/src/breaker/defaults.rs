//! Built-in breaker configuration per dependency class
//!
//! | Name                | timeout | threshold | reset | volume |
//! |---------------------|---------|-----------|-------|--------|
//! | `inference-service` | 30s     | 50%       | 30s   | 5      |
//! | `vision-service`    | 20s     | 50%       | 30s   | 5      |
//! | `identity-provider` | 10s     | 50%       | 15s   | 5      |
//! | `database`          | 10s     | 70%       | 10s   | 10     |
//! | `external:*`        | 15s     | 50%       | 30s   | 5      |
//! | anything else       | 10s     | 50%       | 30s   | 5      |

use std::time::Duration;

use storeguard_common::resilience::CircuitBreakerConfig;
use storeguard_domain::constants::{
    DATABASE, EXTERNAL_PREFIX, IDENTITY_PROVIDER, INFERENCE_SERVICE, VISION_SERVICE,
};
use storeguard_domain::BreakerOverride;

fn config(timeout_secs: u64, threshold: u8, reset_secs: u64, volume: u32) -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        timeout: Duration::from_secs(timeout_secs),
        error_threshold_percentage: threshold,
        reset_timeout: Duration::from_secs(reset_secs),
        volume_threshold: volume,
        ..CircuitBreakerConfig::default()
    }
}

/// Built-in configuration for a dependency name
pub fn default_config(name: &str) -> CircuitBreakerConfig {
    match name {
        INFERENCE_SERVICE => config(30, 50, 30, 5),
        VISION_SERVICE => config(20, 50, 30, 5),
        IDENTITY_PROVIDER => config(10, 50, 15, 5),
        DATABASE => config(10, 70, 10, 10),
        _ if name.starts_with(EXTERNAL_PREFIX) => config(15, 50, 30, 5),
        _ => CircuitBreakerConfig::default(),
    }
}

/// Layer the set fields of `overrides` on top of `base`.
pub fn apply_override(
    mut base: CircuitBreakerConfig,
    overrides: &BreakerOverride,
) -> CircuitBreakerConfig {
    if let Some(ms) = overrides.timeout_ms {
        base.timeout = Duration::from_millis(ms);
    }
    if let Some(percentage) = overrides.error_threshold_percentage {
        base.error_threshold_percentage = percentage;
    }
    if let Some(ms) = overrides.reset_timeout_ms {
        base.reset_timeout = Duration::from_millis(ms);
    }
    if let Some(volume) = overrides.volume_threshold {
        base.volume_threshold = volume;
    }
    if let Some(ms) = overrides.rolling_window_ms {
        base.rolling_window = Duration::from_millis(ms);
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_tolerates_higher_error_rate() {
        let database = default_config(DATABASE);
        assert_eq!(database.error_threshold_percentage, 70);
        assert_eq!(database.volume_threshold, 10);
        assert_eq!(database.reset_timeout, Duration::from_secs(10));

        assert_eq!(default_config(INFERENCE_SERVICE).error_threshold_percentage, 50);
    }

    #[test]
    fn per_class_timeouts() {
        assert_eq!(default_config(INFERENCE_SERVICE).timeout, Duration::from_secs(30));
        assert_eq!(default_config(VISION_SERVICE).timeout, Duration::from_secs(20));
        assert_eq!(default_config(IDENTITY_PROVIDER).reset_timeout, Duration::from_secs(15));
    }

    #[test]
    fn external_prefix_uses_external_bucket() {
        let weather = default_config("external:weather-api");
        assert_eq!(weather.timeout, Duration::from_secs(15));

        let unknown = default_config("payments");
        assert_eq!(unknown, CircuitBreakerConfig::default());
    }

    #[test]
    fn override_only_touches_set_fields() {
        let overrides = BreakerOverride {
            error_threshold_percentage: Some(90),
            rolling_window_ms: Some(60_000),
            ..Default::default()
        };
        let merged = apply_override(default_config(DATABASE), &overrides);

        assert_eq!(merged.error_threshold_percentage, 90);
        assert_eq!(merged.rolling_window, Duration::from_secs(60));
        assert_eq!(merged.timeout, Duration::from_secs(10));
        assert_eq!(merged.volume_threshold, 10);
    }

    #[test]
    fn all_defaults_validate() {
        for name in [INFERENCE_SERVICE, VISION_SERVICE, IDENTITY_PROVIDER, DATABASE, "external:x", "x"] {
            assert!(default_config(name).validate().is_ok(), "{name}");
        }
    }
}
