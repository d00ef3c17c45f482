//! Error types for resilience primitives

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Simple configuration error for validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid { message: message.into() }
    }
}

/// Configuration result type using simple config errors
pub type ConfigResult<T> = Result<T, ConfigError>;

/// A deadline fired before the guarded future settled.
///
/// Carries the configured deadline so callers (and retry predicates) can tell
/// a timeout apart from a connection or protocol failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation timed out after {}ms", .timeout.as_millis())]
pub struct TimeoutError {
    pub timeout: Duration,
}

impl TimeoutError {
    /// Configured deadline in whole milliseconds.
    pub fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }
}

/// Outcome of one deadline-bounded attempt that did not succeed.
#[derive(Debug)]
pub enum AttemptError<E> {
    /// The attempt was cancelled at its deadline.
    TimedOut(TimeoutError),
    /// The attempt ran to completion and failed.
    Failed(E),
}

impl<E> AttemptError<E> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut(_))
    }

    /// The operation error, if the attempt did not time out.
    pub fn failure(&self) -> Option<&E> {
        match self {
            Self::Failed(error) => Some(error),
            Self::TimedOut(_) => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for AttemptError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimedOut(timeout) => fmt::Display::fmt(timeout, f),
            Self::Failed(error) => fmt::Display::fmt(error, f),
        }
    }
}

impl<E> std::error::Error for AttemptError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TimedOut(_) => None,
            Self::Failed(error) => error.source(),
        }
    }
}

/// Why a breaker answered with its fallback instead of the real result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackCause {
    /// The circuit is open; the action was never invoked.
    CircuitOpen,
    /// The circuit is half-open and another call is already probing.
    ProbeInFlight,
    /// The action exceeded the breaker's call timeout.
    Timeout(Duration),
    /// The action ran and failed.
    Failure(String),
}

impl FallbackCause {
    /// True when the action was never invoked.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::CircuitOpen | Self::ProbeInFlight)
    }
}

impl fmt::Display for FallbackCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CircuitOpen => write!(f, "circuit open"),
            Self::ProbeInFlight => write!(f, "half-open probe in flight"),
            Self::Timeout(timeout) => write!(f, "timed out after {}ms", timeout.as_millis()),
            Self::Failure(message) => write!(f, "call failed: {message}"),
        }
    }
}

/// Errors surfaced by [`CircuitBreaker::fire`](super::CircuitBreaker::fire)
/// when no fallback was supplied.
#[derive(Debug, Error)]
pub enum BreakerError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// The breaker refused the call; the dependency was not contacted.
    #[error("{dependency} is temporarily unavailable ({cause})")]
    Unavailable { dependency: String, cause: FallbackCause },

    /// The call exceeded the breaker's timeout.
    #[error("{dependency} call timed out after {}ms", .timeout.as_millis())]
    Timeout { dependency: String, timeout: Duration },

    /// The wrapped action failed.
    #[error("{dependency} call failed")]
    Operation {
        dependency: String,
        #[source]
        source: E,
    },

    /// No breaker could be built from the dependency's configuration.
    #[error("{dependency} breaker is misconfigured")]
    Misconfigured {
        dependency: String,
        #[source]
        source: ConfigError,
    },
}

impl<E> BreakerError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Name of the dependency whose breaker produced this error.
    pub fn dependency(&self) -> &str {
        match self {
            Self::Unavailable { dependency, .. }
            | Self::Timeout { dependency, .. }
            | Self::Operation { dependency, .. }
            | Self::Misconfigured { dependency, .. } => dependency,
        }
    }

    /// True when the breaker short-circuited the call.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// True when the call hit the breaker timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Unwrap the underlying operation error, if any.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::Operation { source, .. } => Some(source),
            _ => None,
        }
    }
}
