//! Dead-letter queue service - resolution workflow and statistics

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use storeguard_domain::constants::DEFAULT_DLQ_PAGE_SIZE;
use storeguard_domain::{
    DlqRecord, DlqSourceStats, NewDlqRecord, ResolutionType, Result, StoreGuardError,
};
use tracing::{debug, error, info, warn};

use super::ports::DlqRepository;
use crate::retry::{RetryOptions, RetryOutcome, RetryService};

/// Dead-letter queue over a [`DlqRepository`]
pub struct DlqService {
    repository: Arc<dyn DlqRepository>,
}

impl DlqService {
    /// Create a new DLQ service
    pub fn new(repository: Arc<dyn DlqRepository>) -> Self {
        Self { repository }
    }

    /// Record a terminally failed unit of work.
    ///
    /// Best effort: a storage failure is logged and yields `None`.
    pub async fn add_to_dlq(&self, record: NewDlqRecord) -> Option<String> {
        let source_queue = record.source_queue.clone();

        match self.repository.insert(record).await {
            Ok(stored) => {
                warn!(
                    dlq_id = %stored.id,
                    source_queue = %stored.source_queue,
                    original_id = stored.original_id.as_deref().unwrap_or(""),
                    attempts = stored.attempts,
                    error = %stored.error_message,
                    "work item moved to dead letter queue"
                );
                Some(stored.id)
            }
            Err(err) => {
                error!(
                    source_queue = %source_queue,
                    error = %err,
                    "failed to write dead letter record"
                );
                None
            }
        }
    }

    /// Pending items, newest first. `limit` defaults to 50.
    pub async fn get_items(
        &self,
        source_queue: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<DlqRecord>> {
        let limit = limit.unwrap_or(DEFAULT_DLQ_PAGE_SIZE);
        if limit == 0 {
            return Err(StoreGuardError::InvalidInput("limit must be greater than 0".into()));
        }
        self.repository.list_pending(source_queue, limit).await
    }

    /// One record regardless of state
    pub async fn get_item(&self, id: &str) -> Result<Option<DlqRecord>> {
        self.repository.get(id).await
    }

    /// Resolve a pending item. Returns `false` (not an error) when the item is
    /// missing or was already resolved.
    pub async fn resolve_item(
        &self,
        id: &str,
        resolved_by: &str,
        resolution_type: ResolutionType,
        notes: Option<&str>,
    ) -> Result<bool> {
        let resolved = self.repository.resolve(id, resolved_by, resolution_type, notes).await?;

        if resolved {
            info!(
                dlq_id = %id,
                resolved_by,
                resolution = %resolution_type,
                "dead letter item resolved"
            );
        } else {
            debug!(dlq_id = %id, "dead letter item missing or already resolved");
        }

        Ok(resolved)
    }

    /// Replay a pending item's payload once.
    ///
    /// On success the item is resolved as `reprocessed`; on failure it stays
    /// pending with its attempt count unchanged. Missing or resolved ids yield
    /// [`StoreGuardError::NotFound`].
    pub async fn reprocess_item<F, Fut, T, E>(
        &self,
        id: &str,
        mut action: F,
        resolved_by: &str,
    ) -> Result<RetryOutcome<T, E>>
    where
        F: FnMut(Value) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: StdError + Send + Sync + 'static,
    {
        let record = match self.repository.get(id).await? {
            Some(record) if record.is_pending() => record,
            _ => return Err(StoreGuardError::NotFound(format!("pending dlq item {id}"))),
        };

        let options = RetryOptions::new().max_retries(0);
        let payload = record.payload;
        let outcome = RetryService::without_dlq()
            .execute(&record.source_queue, || action(payload.clone()), &options)
            .await;

        match &outcome.result {
            Ok(_) => {
                let resolved = self
                    .resolve_item(id, resolved_by, ResolutionType::Reprocessed, Some("reprocessed"))
                    .await?;
                if !resolved {
                    warn!(dlq_id = %id, "reprocessed item was resolved concurrently");
                }
            }
            Err(err) => {
                warn!(dlq_id = %id, error = %err, "reprocessing failed, item stays pending");
            }
        }

        Ok(outcome)
    }

    /// Pending/resolved totals per source queue
    pub async fn stats(&self) -> Result<BTreeMap<String, DlqSourceStats>> {
        self.repository.stats().await
    }
}
