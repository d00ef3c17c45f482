//! Retry policy and outcome types

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use storeguard_common::resilience::{AttemptError, ExponentialBackoff};
use storeguard_domain::{RetryDefaults, StoreGuardError};

type ShouldRetryFn<E> = Arc<dyn Fn(&E, u32) -> bool + Send + Sync>;
type OnRetryFn<E> = Arc<dyn Fn(&E, u32, Duration) + Send + Sync>;
type ErrorCodeFn<E> = Arc<dyn Fn(&E) -> Option<String> + Send + Sync>;

/// Error code recorded for work whose last attempt hit its deadline
pub const TIMEOUT_ERROR_CODE: &str = "TIMEOUT";

/// Payload recorded in the dead-letter queue when retries are exhausted
#[derive(Debug, Clone, PartialEq)]
pub struct DeadLetter {
    pub payload: Value,
    pub original_id: Option<String>,
    pub metadata: Option<Value>,
}

impl DeadLetter {
    pub fn new(payload: Value) -> Self {
        Self { payload, original_id: None, metadata: None }
    }

    pub fn with_original_id(mut self, original_id: impl Into<String>) -> Self {
        self.original_id = Some(original_id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// How a unit of work is retried and what happens on terminal failure.
///
/// `max_retries` counts retries, so the action runs at most
/// `max_retries + 1` times.
pub struct RetryOptions<E> {
    max_retries: u32,
    backoff: ExponentialBackoff,
    should_retry: Option<ShouldRetryFn<E>>,
    on_retry: Option<OnRetryFn<E>>,
    error_code: Option<ErrorCodeFn<E>>,
    dead_letter: Option<DeadLetter>,
}

impl<E> Clone for RetryOptions<E> {
    fn clone(&self) -> Self {
        Self {
            max_retries: self.max_retries,
            backoff: self.backoff.clone(),
            should_retry: self.should_retry.clone(),
            on_retry: self.on_retry.clone(),
            error_code: self.error_code.clone(),
            dead_letter: self.dead_letter.clone(),
        }
    }
}

impl<E> fmt::Debug for RetryOptions<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("max_retries", &self.max_retries)
            .field("backoff", &self.backoff)
            .field("should_retry", &self.should_retry.is_some())
            .field("on_retry", &self.on_retry.is_some())
            .field("error_code", &self.error_code.is_some())
            .field("dead_letter", &self.dead_letter)
            .finish()
    }
}

impl<E> Default for RetryOptions<E> {
    fn default() -> Self {
        Self {
            max_retries: storeguard_domain::constants::DEFAULT_MAX_RETRIES,
            backoff: ExponentialBackoff::default(),
            should_retry: None,
            on_retry: None,
            error_code: None,
            dead_letter: None,
        }
    }
}

impl<E> RetryOptions<E> {
    /// Options with 3 retries and a 1s..30s doubling backoff
    pub fn new() -> Self {
        Self::default()
    }

    /// Options built from configured defaults
    pub fn from_defaults(defaults: &RetryDefaults) -> Result<Self, StoreGuardError> {
        let backoff = ExponentialBackoff::new(
            Duration::from_millis(defaults.initial_delay_ms),
            Duration::from_millis(defaults.max_delay_ms),
            defaults.backoff_factor,
        )
        .map_err(|e| StoreGuardError::Config(e.to_string()))?;

        Ok(Self { max_retries: defaults.max_retries, backoff, ..Self::default() })
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn backoff(mut self, backoff: ExponentialBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Veto further attempts; receives the error and the 1-indexed attempt
    /// that produced it.
    pub fn should_retry<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E, u32) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Some(Arc::new(predicate));
        self
    }

    /// Observe each retry before its delay.
    pub fn on_retry<F>(mut self, hook: F) -> Self
    where
        F: Fn(&E, u32, Duration) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(hook));
        self
    }

    /// Extract a machine-readable code recorded with dead-lettered work.
    pub fn error_code<F>(mut self, extractor: F) -> Self
    where
        F: Fn(&E) -> Option<String> + Send + Sync + 'static,
    {
        self.error_code = Some(Arc::new(extractor));
        self
    }

    pub fn dead_letter(mut self, dead_letter: DeadLetter) -> Self {
        self.dead_letter = Some(dead_letter);
        self
    }

    pub fn without_dead_letter(mut self) -> Self {
        self.dead_letter = None;
        self
    }

    pub fn get_max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Upper bound on action invocations
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn get_backoff(&self) -> &ExponentialBackoff {
        &self.backoff
    }

    pub fn get_dead_letter(&self) -> Option<&DeadLetter> {
        self.dead_letter.as_ref()
    }

    pub(crate) fn allows_retry(&self, error: &E, attempt: u32) -> bool {
        self.should_retry.as_ref().map_or(true, |predicate| predicate(error, attempt))
    }

    pub(crate) fn notify_retry(&self, error: &E, attempt: u32, delay: Duration) {
        if let Some(hook) = &self.on_retry {
            hook(error, attempt, delay);
        }
    }

    pub(crate) fn code_for(&self, error: &E) -> Option<String> {
        self.error_code.as_ref().and_then(|extractor| extractor(error))
    }
}

impl<E: 'static> RetryOptions<E> {
    /// The same policy over deadline-bounded attempts.
    ///
    /// Timed-out attempts are always retryable, skip the `on_retry` hook, and
    /// are dead-lettered with code `TIMEOUT`. Failed attempts go through the
    /// caller's hooks unchanged.
    pub(crate) fn for_attempts(&self) -> RetryOptions<AttemptError<E>> {
        let should_retry: Option<ShouldRetryFn<AttemptError<E>>> =
            self.should_retry.clone().map(|predicate| {
                Arc::new(move |error: &AttemptError<E>, attempt: u32| match error {
                    AttemptError::Failed(inner) => predicate(inner, attempt),
                    AttemptError::TimedOut(_) => true,
                }) as ShouldRetryFn<AttemptError<E>>
            });
        let on_retry: Option<OnRetryFn<AttemptError<E>>> = self.on_retry.clone().map(|hook| {
            Arc::new(move |error: &AttemptError<E>, attempt: u32, delay: Duration| {
                if let AttemptError::Failed(inner) = error {
                    hook(inner, attempt, delay);
                }
            }) as OnRetryFn<AttemptError<E>>
        });
        let extractor = self.error_code.clone();
        let error_code: ErrorCodeFn<AttemptError<E>> =
            Arc::new(move |error: &AttemptError<E>| match error {
                AttemptError::TimedOut(_) => Some(TIMEOUT_ERROR_CODE.to_string()),
                AttemptError::Failed(inner) => extractor.as_ref().and_then(|f| f(inner)),
            });

        RetryOptions {
            max_retries: self.max_retries,
            backoff: self.backoff.clone(),
            should_retry,
            on_retry,
            error_code: Some(error_code),
            dead_letter: self.dead_letter.clone(),
        }
    }
}

/// Result of a retried unit of work
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: Result<T, E>,
    /// Invocations actually made
    pub attempts: u32,
    /// Dead-letter record id, set only when the failure was escalated
    pub dlq_id: Option<String>,
}

impl<T, E> RetryOutcome<T, E> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn data(&self) -> Option<&T> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&E> {
        self.result.as_ref().err()
    }

    pub fn into_result(self) -> Result<T, E> {
        self.result
    }
}
