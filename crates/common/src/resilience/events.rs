//! Breaker notifications and fallbacks.
//!
//! Listeners observe transitions but never feed back into the state machine:
//! events are delivered after the breaker lock is released.

use std::time::Duration;

use super::error::FallbackCause;

/// Something a breaker did that operators may want to see.
#[derive(Debug, Clone, PartialEq)]
pub enum BreakerEvent {
    /// Transitioned to OPEN with the observed failure rate (percent).
    Opened { failure_rate: f64 },
    /// Reset timeout elapsed; the next call probes the dependency.
    HalfOpened,
    /// Transitioned to CLOSED; counters were zeroed.
    Closed,
    /// A call was refused without reaching the dependency.
    Rejected { cause: FallbackCause },
    /// A call exceeded the breaker timeout.
    TimedOut { timeout: Duration },
    /// A fallback value was returned in place of the real result.
    Fallback { cause: FallbackCause },
}

impl BreakerEvent {
    /// Stable label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Opened { .. } => "open",
            Self::HalfOpened => "half_open",
            Self::Closed => "close",
            Self::Rejected { .. } => "reject",
            Self::TimedOut { .. } => "timeout",
            Self::Fallback { .. } => "fallback",
        }
    }
}

/// Observer for breaker events.
pub trait BreakerListener: Send + Sync {
    fn on_event(&self, breaker: &str, event: &BreakerEvent);
}

/// Substitute result produced when a breaker cannot (or did not) deliver the
/// real one. Implemented for any `Fn(&FallbackCause) -> T`.
pub trait Fallback<T>: Send + Sync {
    fn fallback(&self, cause: &FallbackCause) -> T;
}

impl<T, F> Fallback<T> for F
where
    F: Fn(&FallbackCause) -> T + Send + Sync,
{
    fn fallback(&self, cause: &FallbackCause) -> T {
        self(cause)
    }
}
