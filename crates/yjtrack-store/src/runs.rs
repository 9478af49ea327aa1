//! Primary-store operations for the `run_records` ledger.
//!
//! A run is opened in `started` status and closed exactly once; both close
//! paths carry a `WHERE status = 'started'` guard so a second close (or a
//! close of a never-opened run) surfaces as [`StoreError::InvalidTransition`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::StoreError;

/// A row from the `run_records` table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RunRecordRow {
    pub id: i64,
    pub public_id: Uuid,
    pub task_name: String,
    pub data_source: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    pub records_found: i32,
    pub records_processed: i32,
    pub records_inserted: i32,
    pub records_updated: i32,
    pub error_message: Option<String>,
}

/// Record counts reported when closing a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunCounts {
    pub found: i32,
    pub processed: i32,
    pub inserted: i32,
    pub updated: i32,
}

const COLUMNS: &str = "id, public_id, task_name, data_source, status, \
     started_at, completed_at, duration_seconds, records_found, \
     records_processed, records_inserted, records_updated, error_message";

/// Opens a new run in `started` status and returns the full row.
///
/// # Errors
///
/// Returns [`StoreError::Sqlx`] if the insert fails.
pub async fn open_run(
    pool: &PgPool,
    task_name: &str,
    data_source: &str,
) -> Result<RunRecordRow, StoreError> {
    let public_id = Uuid::new_v4();

    let row = sqlx::query_as::<_, RunRecordRow>(&format!(
        "INSERT INTO run_records (public_id, task_name, data_source, status) \
         VALUES ($1, $2, $3, 'started') \
         RETURNING {COLUMNS}"
    ))
    .bind(public_id)
    .bind(task_name)
    .bind(data_source)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Closes a run as `completed`, recording counts and duration.
///
/// # Errors
///
/// Returns [`StoreError::InvalidTransition`] if the run is not in `started`
/// status, or [`StoreError::Sqlx`] if the update fails.
pub async fn complete_run(pool: &PgPool, id: i64, counts: &RunCounts) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE run_records \
         SET status = 'completed', completed_at = NOW(), \
             duration_seconds = EXTRACT(EPOCH FROM (NOW() - started_at)), \
             records_found = $1, records_processed = $2, \
             records_inserted = $3, records_updated = $4 \
         WHERE id = $5 AND status = 'started'",
    )
    .bind(counts.found)
    .bind(counts.processed)
    .bind(counts.inserted)
    .bind(counts.updated)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::InvalidTransition {
            id,
            expected_status: "started",
        });
    }

    Ok(())
}

/// Closes a run as `failed`, recording the error message and any counts
/// gathered before the failure.
///
/// # Errors
///
/// Returns [`StoreError::InvalidTransition`] if the run is not in `started`
/// status, or [`StoreError::Sqlx`] if the update fails.
pub async fn fail_run(
    pool: &PgPool,
    id: i64,
    error_message: &str,
    counts: &RunCounts,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE run_records \
         SET status = 'failed', completed_at = NOW(), \
             duration_seconds = EXTRACT(EPOCH FROM (NOW() - started_at)), \
             records_found = $1, records_processed = $2, \
             records_inserted = $3, records_updated = $4, \
             error_message = $5 \
         WHERE id = $6 AND status = 'started'",
    )
    .bind(counts.found)
    .bind(counts.processed)
    .bind(counts.inserted)
    .bind(counts.updated)
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::InvalidTransition {
            id,
            expected_status: "started",
        });
    }

    Ok(())
}

/// Returns the most recent `limit` runs, newest first.
///
/// # Errors
///
/// Returns [`StoreError::Sqlx`] if the query fails.
pub async fn list_runs(pool: &PgPool, limit: i64) -> Result<Vec<RunRecordRow>, StoreError> {
    let rows = sqlx::query_as::<_, RunRecordRow>(&format!(
        "SELECT {COLUMNS} FROM run_records \
         ORDER BY started_at DESC, id DESC \
         LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
