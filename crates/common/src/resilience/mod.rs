//! Resilience primitives for outbound calls
//!
//! Generic building blocks with no knowledge of any particular dependency:
//! - **Circuit Breaker**: error-rate breaker with a rolling window, a single
//!   half-open probe, a per-call timeout, and typed fallbacks
//! - **Backoff**: exponential delay schedule with symmetric jitter
//! - **Timeout**: hard deadline for a single future
//!
//! Domain wiring (named breakers, retry with dead-lettering) lives in
//! `storeguard-core`.

pub mod backoff;
pub mod circuit_breaker;
pub mod clock;
pub mod error;
pub mod events;
pub mod timeout;

pub use backoff::ExponentialBackoff;
pub use circuit_breaker::{
    BreakerCounters, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder,
    CircuitBreakerMetrics, CircuitState,
};
pub use clock::{Clock, MockClock, SystemClock};
pub use error::{
    AttemptError, BreakerError, ConfigError, ConfigResult, FallbackCause, TimeoutError,
};
pub use events::{BreakerEvent, BreakerListener, Fallback};
pub use timeout::{attempt_within, with_timeout, DEFAULT_CALL_TIMEOUT};
