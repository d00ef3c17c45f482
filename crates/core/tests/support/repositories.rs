//! In-memory repository implementations for testing
//!
//! Provides a deterministic `DlqRepository` without database dependencies,
//! plus a switch to simulate storage outages.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use storeguard_core::DlqRepository;
use storeguard_domain::{
    DlqRecord, DlqSourceStats, NewDlqRecord, ResolutionType, Result as DomainResult,
    StoreGuardError,
};

/// In-memory mock for `DlqRepository`.
#[derive(Default, Clone)]
pub struct InMemoryDlqRepository {
    records: Arc<Mutex<Vec<DlqRecord>>>,
    fail_writes: Arc<AtomicBool>,
}

impl InMemoryDlqRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent inserts fail with a database error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of every stored record in insertion order.
    pub fn all(&self) -> Vec<DlqRecord> {
        self.records.lock().clone()
    }
}

#[async_trait]
impl DlqRepository for InMemoryDlqRepository {
    async fn insert(&self, record: NewDlqRecord) -> DomainResult<DlqRecord> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreGuardError::Database("database is locked".into()));
        }

        let stored = record.into_record(Utc::now());
        self.records.lock().push(stored.clone());
        Ok(stored)
    }

    async fn get(&self, id: &str) -> DomainResult<Option<DlqRecord>> {
        Ok(self.records.lock().iter().find(|r| r.id == id).cloned())
    }

    async fn list_pending(
        &self,
        source_queue: Option<&str>,
        limit: u32,
    ) -> DomainResult<Vec<DlqRecord>> {
        let mut pending: Vec<DlqRecord> = self
            .records
            .lock()
            .iter()
            .rev()
            .filter(|r| r.is_pending())
            .filter(|r| source_queue.map_or(true, |source| r.source_queue == source))
            .cloned()
            .collect();
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        pending.truncate(limit as usize);
        Ok(pending)
    }

    async fn resolve(
        &self,
        id: &str,
        resolved_by: &str,
        resolution_type: ResolutionType,
        notes: Option<&str>,
    ) -> DomainResult<bool> {
        let mut records = self.records.lock();
        match records.iter_mut().find(|r| r.id == id && r.is_pending()) {
            Some(record) => {
                record.resolved_at = Some(Utc::now());
                record.resolved_by = Some(resolved_by.to_string());
                record.resolution_type = Some(resolution_type);
                record.resolution_notes = notes.map(str::to_string);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn stats(&self) -> DomainResult<BTreeMap<String, DlqSourceStats>> {
        let mut stats: BTreeMap<String, DlqSourceStats> = BTreeMap::new();
        for record in self.records.lock().iter() {
            let entry = stats.entry(record.source_queue.clone()).or_default();
            if record.is_pending() {
                entry.pending += 1;
            } else {
                entry.resolved += 1;
            }
        }
        Ok(stats)
    }
}
