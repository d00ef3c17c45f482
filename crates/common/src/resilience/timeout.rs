//! Deadline guard for a single outbound call.
//!
//! The guarded future is dropped when the deadline fires. Cancellation is
//! cooperative: the transport underneath must stop work when its future is
//! dropped (reqwest and tokio I/O do).

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use super::error::{AttemptError, TimeoutError};

/// Deadline applied when the caller does not specify one.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Run `future` with a hard deadline.
pub async fn with_timeout<F>(deadline: Duration, future: F) -> Result<F::Output, TimeoutError>
where
    F: Future,
{
    match tokio::time::timeout(deadline, future).await {
        Ok(output) => Ok(output),
        Err(_) => {
            debug!(timeout_ms = deadline.as_millis() as u64, "guarded call exceeded deadline");
            Err(TimeoutError { timeout: deadline })
        }
    }
}

/// Run a fallible `future` with a hard deadline, folding a missed deadline
/// into the attempt's error.
pub async fn attempt_within<F, T, E>(deadline: Duration, future: F) -> Result<T, AttemptError<E>>
where
    F: Future<Output = Result<T, E>>,
{
    match with_timeout(deadline, future).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(AttemptError::Failed(error)),
        Err(timeout) => Err(AttemptError::TimedOut(timeout)),
    }
}
