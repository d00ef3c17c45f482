//! SQLite-backed dead-letter queue repository
//!
//! Timestamps are stored as Unix milliseconds; payload and metadata as JSON
//! text. Every call runs on the blocking pool with its own pooled connection.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;
use storeguard_core::DlqRepository;
use storeguard_domain::constants::DLQ_TABLE;
use storeguard_domain::{
    DlqRecord, DlqSourceStats, NewDlqRecord, ResolutionType, Result as DomainResult,
};
use tokio::task;

use super::manager::{map_sql_error, DbManager};
use crate::errors::{map_join_error, InfraError};

const SELECT_COLUMNS: &str = "id, source_queue, original_id, payload, error_message, error_stack,
        error_code, attempts, max_attempts, metadata, created_at, resolved_at, resolved_by,
        resolution_type, resolution_notes";

/// SQLite implementation of [`DlqRepository`]
pub struct SqliteDlqRepository {
    db: Arc<DbManager>,
}

impl SqliteDlqRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DlqRepository for SqliteDlqRepository {
    async fn insert(&self, record: NewDlqRecord) -> DomainResult<DlqRecord> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<DlqRecord> {
            let record = record.into_record(Utc::now());
            let conn = db.get_connection()?;
            insert_record(&conn, &record)?;
            Ok(record)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn get(&self, id: &str) -> DomainResult<Option<DlqRecord>> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<DlqRecord>> {
            let conn = db.get_connection()?;
            query_record(&conn, &id).map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn list_pending(
        &self,
        source_queue: Option<&str>,
        limit: u32,
    ) -> DomainResult<Vec<DlqRecord>> {
        let db = Arc::clone(&self.db);
        let source_queue = source_queue.map(str::to_string);

        task::spawn_blocking(move || -> DomainResult<Vec<DlqRecord>> {
            let conn = db.get_connection()?;
            query_pending(&conn, source_queue.as_deref(), limit).map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn resolve(
        &self,
        id: &str,
        resolved_by: &str,
        resolution_type: ResolutionType,
        notes: Option<&str>,
    ) -> DomainResult<bool> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();
        let resolved_by = resolved_by.to_string();
        let notes = notes.map(str::to_string);

        task::spawn_blocking(move || -> DomainResult<bool> {
            let conn = db.get_connection()?;
            let sql = format!(
                "UPDATE {DLQ_TABLE}
                 SET resolved_at = ?1, resolved_by = ?2, resolution_type = ?3,
                     resolution_notes = ?4
                 WHERE id = ?5 AND resolved_at IS NULL"
            );
            let changed = conn
                .execute(
                    &sql,
                    params![
                        Utc::now().timestamp_millis(),
                        resolved_by,
                        resolution_type.as_str(),
                        notes,
                        id
                    ],
                )
                .map_err(map_sql_error)?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn stats(&self) -> DomainResult<BTreeMap<String, DlqSourceStats>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<BTreeMap<String, DlqSourceStats>> {
            let conn = db.get_connection()?;
            query_stats(&conn).map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

// ============================================================================
// SQL Operations (synchronous)
// ============================================================================

fn insert_record(conn: &Connection, record: &DlqRecord) -> DomainResult<()> {
    let payload = serde_json::to_string(&record.payload).map_err(InfraError::from)?;
    let metadata = record
        .metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(InfraError::from)?;

    let sql = format!(
        "INSERT INTO {DLQ_TABLE} (id, source_queue, original_id, payload, error_message,
                                  error_stack, error_code, attempts, max_attempts, metadata,
                                  created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
    );
    conn.execute(
        &sql,
        params![
            record.id,
            record.source_queue,
            record.original_id,
            payload,
            record.error_message,
            record.error_stack,
            record.error_code,
            record.attempts,
            record.max_attempts,
            metadata,
            record.created_at.timestamp_millis(),
        ],
    )
    .map_err(map_sql_error)?;

    Ok(())
}

fn query_record(conn: &Connection, id: &str) -> rusqlite::Result<Option<DlqRecord>> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM {DLQ_TABLE} WHERE id = ?1");
    conn.query_row(&sql, params![id], map_record_row).optional()
}

fn query_pending(
    conn: &Connection,
    source_queue: Option<&str>,
    limit: u32,
) -> rusqlite::Result<Vec<DlqRecord>> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM {DLQ_TABLE}
         WHERE resolved_at IS NULL AND (?1 IS NULL OR source_queue = ?1)
         ORDER BY created_at DESC, rowid DESC
         LIMIT ?2"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![source_queue, limit], map_record_row)?;
    rows.collect()
}

fn query_stats(conn: &Connection) -> rusqlite::Result<BTreeMap<String, DlqSourceStats>> {
    let sql = format!(
        "SELECT source_queue,
                SUM(CASE WHEN resolved_at IS NULL THEN 1 ELSE 0 END),
                SUM(CASE WHEN resolved_at IS NULL THEN 0 ELSE 1 END)
         FROM {DLQ_TABLE}
         GROUP BY source_queue"
    );
    let mut stmt = conn.prepare(&sql)?;

    let rows = stmt.query_map([], |row| {
        let source: String = row.get(0)?;
        let pending: i64 = row.get(1)?;
        let resolved: i64 = row.get(2)?;
        Ok((source, DlqSourceStats { pending: pending as u64, resolved: resolved as u64 }))
    })?;

    rows.collect()
}

fn map_record_row(row: &Row<'_>) -> rusqlite::Result<DlqRecord> {
    let resolution_type = row
        .get::<_, Option<String>>(13)?
        .map(|raw| {
            ResolutionType::from_str(&raw).map_err(|e| conversion_error(13, Type::Text, e))
        })
        .transpose()?;

    Ok(DlqRecord {
        id: row.get(0)?,
        source_queue: row.get(1)?,
        original_id: row.get(2)?,
        payload: json_column(row, 3)?,
        error_message: row.get(4)?,
        error_stack: row.get(5)?,
        error_code: row.get(6)?,
        attempts: row.get(7)?,
        max_attempts: row.get(8)?,
        metadata: row
            .get::<_, Option<String>>(9)?
            .map(|raw| serde_json::from_str(&raw).map_err(|e| conversion_error(9, Type::Text, e)))
            .transpose()?,
        created_at: millis_to_datetime(row.get(10)?, 10)?,
        resolved_at: row.get::<_, Option<i64>>(11)?.map(|ms| millis_to_datetime(ms, 11)).transpose()?,
        resolved_by: row.get(12)?,
        resolution_type,
        resolution_notes: row.get(14)?,
    })
}

fn json_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Value> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, Type::Text, e))
}

fn millis_to_datetime(millis: i64, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        conversion_error(idx, Type::Integer, format!("timestamp out of range: {millis}"))
    })
}

fn conversion_error<E>(idx: usize, ty: Type, err: E) -> rusqlite::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    rusqlite::Error::FromSqlConversionFailure(idx, ty, err.into())
}

// ============================================================================
// Tests
// ============================================================================
