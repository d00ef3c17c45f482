//! Dead-letter queue records
//!
//! A record holds one unit of work that exhausted its retries, together with
//! the last error and, once handled, how it was resolved. A record is pending
//! while `resolved_at` is `None`; resolution happens at most once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::impl_str_enum;

/// How a dead-lettered item was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionType {
    /// The payload was replayed successfully
    Reprocessed,
    /// An operator decided the item needs no further action
    Ignored,
    /// The underlying data or dependency was repaired out of band
    Fixed,
}

impl_str_enum!(ResolutionType {
    Reprocessed => "reprocessed",
    Ignored => "ignored",
    Fixed => "fixed",
});

/// A persisted dead-letter record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DlqRecord {
    pub id: String,
    pub source_queue: String,
    pub original_id: Option<String>,
    pub payload: Value,
    pub error_message: String,
    pub error_stack: Option<String>,
    pub error_code: Option<String>,
    pub attempts: u32,
    pub max_attempts: u32,
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub resolution_type: Option<ResolutionType>,
    pub resolution_notes: Option<String>,
}

impl DlqRecord {
    pub fn is_pending(&self) -> bool {
        self.resolved_at.is_none()
    }
}

/// Input for a new dead-letter record; id and timestamps are assigned on
/// insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDlqRecord {
    pub source_queue: String,
    pub original_id: Option<String>,
    pub payload: Value,
    pub error_message: String,
    pub error_stack: Option<String>,
    pub error_code: Option<String>,
    pub attempts: u32,
    pub max_attempts: u32,
    pub metadata: Option<Value>,
}

impl NewDlqRecord {
    /// Minimal record; the optional fields start empty.
    pub fn new(
        source_queue: impl Into<String>,
        payload: Value,
        error_message: impl Into<String>,
        attempts: u32,
        max_attempts: u32,
    ) -> Self {
        Self {
            source_queue: source_queue.into(),
            original_id: None,
            payload,
            error_message: error_message.into(),
            error_stack: None,
            error_code: None,
            attempts,
            max_attempts,
            metadata: None,
        }
    }

    pub fn with_original_id(mut self, original_id: impl Into<String>) -> Self {
        self.original_id = Some(original_id.into());
        self
    }

    pub fn with_error_stack(mut self, stack: impl Into<String>) -> Self {
        self.error_stack = Some(stack.into());
        self
    }

    pub fn with_error_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Materialize as a pending record with a fresh UUID.
    pub fn into_record(self, created_at: DateTime<Utc>) -> DlqRecord {
        DlqRecord {
            id: Uuid::new_v4().to_string(),
            source_queue: self.source_queue,
            original_id: self.original_id,
            payload: self.payload,
            error_message: self.error_message,
            error_stack: self.error_stack,
            error_code: self.error_code,
            attempts: self.attempts,
            max_attempts: self.max_attempts,
            metadata: self.metadata,
            created_at,
            resolved_at: None,
            resolved_by: None,
            resolution_type: None,
            resolution_notes: None,
        }
    }
}

/// Pending/resolved totals for one source queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DlqSourceStats {
    pub pending: u64,
    pub resolved: u64,
}

impl DlqSourceStats {
    pub fn total(&self) -> u64 {
        self.pending + self.resolved
    }
}
