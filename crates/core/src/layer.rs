//! Breaker-protected retries
//!
//! `ResilienceLayer` composes the two mechanisms: the breaker for a dependency
//! wraps the whole retry loop, so a dependency that keeps failing after
//! retries trips its breaker and later callers fail fast instead of retrying.
//! The breaker timeout applies to every attempt inside the loop.

use std::error::Error as StdError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use storeguard_common::resilience::{
    attempt_within, AttemptError, BreakerError, Clock, Fallback, FallbackCause, SystemClock,
};

use crate::breaker::BreakerRegistry;
use crate::retry::{RetryOptions, RetryService};

/// Entry point for protected outbound calls
pub struct ResilienceLayer<C: Clock + Clone = SystemClock> {
    registry: Arc<BreakerRegistry<C>>,
    retry: RetryService,
}

impl<C: Clock + Clone> Clone for ResilienceLayer<C> {
    fn clone(&self) -> Self {
        Self { registry: Arc::clone(&self.registry), retry: self.retry.clone() }
    }
}

impl<C: Clock + Clone> ResilienceLayer<C> {
    pub fn new(registry: Arc<BreakerRegistry<C>>, retry: RetryService) -> Self {
        Self { registry, retry }
    }

    pub fn registry(&self) -> &BreakerRegistry<C> {
        &self.registry
    }

    pub fn retry(&self) -> &RetryService {
        &self.retry
    }

    /// Retry `action` under `options`, guarded by the breaker for
    /// `dependency`.
    ///
    /// The retry loop runs inside one breaker call and the breaker tallies
    /// its final outcome. The breaker timeout bounds each attempt, not the
    /// loop. Timed-out attempts are retried; terminal failures are
    /// dead-lettered under the dependency name when `options` carries a
    /// payload.
    pub async fn protected_call<F, Fut, T, E>(
        &self,
        dependency: &str,
        action: F,
        options: &RetryOptions<E>,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: StdError + Send + Sync + 'static,
    {
        let breaker = self.registry.breaker(dependency).map_err(|source| {
            BreakerError::Misconfigured { dependency: dependency.to_string(), source }
        })?;
        let timeout = breaker.config().timeout;
        let attempts = options.for_attempts();

        breaker.guard(|| self.retry_attempts(dependency, timeout, action, &attempts)).await
    }

    /// Like [`protected_call`](Self::protected_call), answering with
    /// `fallback` when the breaker is open or the retried call fails.
    pub async fn protected_call_with_fallback<F, Fut, T, E, B>(
        &self,
        dependency: &str,
        action: F,
        options: &RetryOptions<E>,
        fallback: &B,
    ) -> T
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: StdError + Send + Sync + 'static,
        B: Fallback<T> + ?Sized,
    {
        let breaker = match self.registry.breaker(dependency) {
            Ok(breaker) => breaker,
            Err(err) => return fallback.fallback(&FallbackCause::Failure(err.to_string())),
        };
        let timeout = breaker.config().timeout;
        let attempts = options.for_attempts();

        breaker
            .guard_with_fallback(
                || self.retry_attempts(dependency, timeout, action, &attempts),
                fallback,
            )
            .await
    }

    async fn retry_attempts<F, Fut, T, E>(
        &self,
        dependency: &str,
        timeout: Duration,
        mut action: F,
        options: &RetryOptions<AttemptError<E>>,
    ) -> Result<T, AttemptError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: StdError + Send + Sync + 'static,
    {
        self.retry
            .execute(dependency, || attempt_within(timeout, action()), options)
            .await
            .into_result()
    }
}
