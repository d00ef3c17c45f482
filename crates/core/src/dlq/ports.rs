//! Port interface for dead-letter persistence

use std::collections::BTreeMap;

use async_trait::async_trait;
use storeguard_domain::{DlqRecord, DlqSourceStats, NewDlqRecord, ResolutionType, Result};

/// Durable storage for dead-lettered work
#[async_trait]
pub trait DlqRepository: Send + Sync {
    /// Insert a new pending record, assigning its id and `created_at`
    async fn insert(&self, record: NewDlqRecord) -> Result<DlqRecord>;

    /// Fetch one record regardless of resolution state
    async fn get(&self, id: &str) -> Result<Option<DlqRecord>>;

    /// Pending records, newest first, optionally filtered by source queue
    async fn list_pending(&self, source_queue: Option<&str>, limit: u32) -> Result<Vec<DlqRecord>>;

    /// Resolve a record if it is still pending.
    ///
    /// Returns `false` when the record is missing or already resolved.
    async fn resolve(
        &self,
        id: &str,
        resolved_by: &str,
        resolution_type: ResolutionType,
        notes: Option<&str>,
    ) -> Result<bool>;

    /// Pending/resolved counts grouped by source queue
    async fn stats(&self) -> Result<BTreeMap<String, DlqSourceStats>>;
}
