//! Retry engine with dead-letter escalation

use std::error::Error as StdError;
use std::fmt::Write as _;
use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;
use storeguard_domain::NewDlqRecord;
use tracing::{debug, info, warn};

use super::options::{DeadLetter, RetryOptions, RetryOutcome};
use crate::dlq::DlqService;

/// One independent unit of work for [`RetryService::execute_all`]
pub struct RetryItem<F> {
    pub action: F,
    pub payload: Option<Value>,
    pub original_id: Option<String>,
}

impl<F> RetryItem<F> {
    pub fn new(action: F) -> Self {
        Self { action, payload: None, original_id: None }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_original_id(mut self, original_id: impl Into<String>) -> Self {
        self.original_id = Some(original_id.into());
        self
    }
}

/// Runs actions with exponential backoff and hands terminal failures to the
/// dead-letter queue.
#[derive(Clone, Default)]
pub struct RetryService {
    dlq: Option<Arc<DlqService>>,
}

impl RetryService {
    pub fn new(dlq: Arc<DlqService>) -> Self {
        Self { dlq: Some(dlq) }
    }

    /// Retry engine that never dead-letters; terminal failures are returned
    /// to the caller only.
    pub fn without_dlq() -> Self {
        Self { dlq: None }
    }

    /// Invoke `action` until it succeeds, the predicate vetoes a retry, or
    /// `max_retries + 1` attempts have failed.
    ///
    /// On terminal failure with a dead-letter payload, a DLQ record is
    /// written before returning. A failed DLQ write leaves `dlq_id` unset and
    /// never replaces the original error.
    pub async fn execute<F, Fut, T, E>(
        &self,
        queue_name: &str,
        mut action: F,
        options: &RetryOptions<E>,
    ) -> RetryOutcome<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: StdError + Send + Sync + 'static,
    {
        let max_attempts = options.max_attempts();
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let error = match action().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(queue = queue_name, attempts = attempt, "operation succeeded after retry");
                    }
                    return RetryOutcome { result: Ok(value), attempts: attempt, dlq_id: None };
                }
                Err(error) => error,
            };

            if attempt >= max_attempts {
                warn!(
                    queue = queue_name,
                    attempts = attempt,
                    error = %error,
                    "retries exhausted"
                );
                let dlq_id = self.escalate(queue_name, &error, attempt, max_attempts, options).await;
                return RetryOutcome { result: Err(error), attempts: attempt, dlq_id };
            }

            if !options.allows_retry(&error, attempt) {
                warn!(
                    queue = queue_name,
                    attempt,
                    error = %error,
                    "error is not retryable, giving up"
                );
                let dlq_id = self.escalate(queue_name, &error, attempt, max_attempts, options).await;
                return RetryOutcome { result: Err(error), attempts: attempt, dlq_id };
            }

            let delay = options.get_backoff().delay(attempt - 1);
            options.notify_retry(&error, attempt, delay);
            debug!(
                queue = queue_name,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "attempt failed, retrying after backoff"
            );
            drop(error);

            tokio::time::sleep(delay).await;
        }
    }

    /// Run independent items concurrently under one policy.
    ///
    /// Each item's payload and original id replace the policy's dead-letter
    /// bundle; items without a payload are never dead-lettered. Outcomes are
    /// returned in input order.
    pub async fn execute_all<I, F, Fut, T, E>(
        &self,
        queue_name: &str,
        items: I,
        options: &RetryOptions<E>,
    ) -> Vec<RetryOutcome<T, E>>
    where
        I: IntoIterator<Item = RetryItem<F>>,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: StdError + Send + Sync + 'static,
    {
        let runs = items.into_iter().map(|item| {
            let item_options = match item.payload {
                Some(payload) => {
                    let metadata = options.get_dead_letter().and_then(|d| d.metadata.clone());
                    let mut dead_letter = DeadLetter::new(payload);
                    dead_letter.original_id = item.original_id;
                    dead_letter.metadata = metadata;
                    options.clone().dead_letter(dead_letter)
                }
                None => options.clone().without_dead_letter(),
            };
            let action = item.action;

            async move { self.execute(queue_name, action, &item_options).await }
        });

        join_all(runs).await
    }

    async fn escalate<E>(
        &self,
        queue_name: &str,
        error: &E,
        attempts: u32,
        max_attempts: u32,
        options: &RetryOptions<E>,
    ) -> Option<String>
    where
        E: StdError + 'static,
    {
        let dead_letter = options.get_dead_letter()?;

        let Some(dlq) = &self.dlq else {
            warn!(queue = queue_name, "no dead letter queue configured, failure not recorded");
            return None;
        };

        let mut record = NewDlqRecord::new(
            queue_name,
            dead_letter.payload.clone(),
            error.to_string(),
            attempts,
            max_attempts,
        )
        .with_error_stack(error_chain(error));
        record.original_id = dead_letter.original_id.clone();
        record.metadata = dead_letter.metadata.clone();
        record.error_code = options.code_for(error);

        dlq.add_to_dlq(record).await
    }
}

/// Debug rendering of an error followed by its `source()` chain.
fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut rendered = format!("{error:?}");
    let mut source = error.source();
    while let Some(cause) = source {
        let _ = write!(rendered, "\ncaused by: {cause}");
        source = cause.source();
    }
    rendered
}
