//! Domain constants
//!
//! Well-known dependency names and default values for the resilience layer.

// Dependency names with dedicated breaker defaults
pub const INFERENCE_SERVICE: &str = "inference-service";
pub const VISION_SERVICE: &str = "vision-service";
pub const IDENTITY_PROVIDER: &str = "identity-provider";
pub const DATABASE: &str = "database";

/// Prefix for arbitrary outbound HTTP dependencies (`external:<name>`)
pub const EXTERNAL_PREFIX: &str = "external:";

// Retry defaults
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1_000;
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

// HTTP invoker
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 30_000;

// Dead letter queue
pub const DLQ_TABLE: &str = "dead_letter_queue";
pub const DEFAULT_DLQ_PAGE_SIZE: u32 = 50;

// Database
pub const DEFAULT_DB_PATH: &str = "storeguard.db";
pub const DEFAULT_DB_POOL_SIZE: u32 = 4;

// Logging
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Breaker name for an external HTTP dependency
pub fn external(name: &str) -> String {
    format!("{EXTERNAL_PREFIX}{name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_names_share_the_wildcard_prefix() {
        assert_eq!(external("pos-gateway"), "external:pos-gateway");
        assert!(external("weather").starts_with(EXTERNAL_PREFIX));
    }
}
