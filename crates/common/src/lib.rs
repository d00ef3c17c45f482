//! Shared primitives for StoreGuard crates.
//!
//! # Feature Tiers
//!
//! Nothing is compiled by default. Enable `runtime` for the async resilience
//! primitives (circuit breaker, backoff, timeout) with tracing.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod resilience;

#[cfg(feature = "runtime")]
pub use resilience::{
    AttemptError, BreakerError, BreakerEvent, BreakerListener, CircuitBreaker,
    CircuitBreakerConfig, CircuitBreakerConfigBuilder, CircuitBreakerMetrics, CircuitState, Clock,
    ExponentialBackoff, Fallback, FallbackCause, MockClock, SystemClock, TimeoutError,
};
