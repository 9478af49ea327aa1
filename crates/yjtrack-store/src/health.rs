//! Primary-store operations for the `health_status` rollup table.
//!
//! The row is always derivable as a fold over `run_records` for the same
//! (task, source) pair; it is maintained incrementally by the engine's
//! health recorder, and this module just reads and upserts whole rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::StoreError;

/// A row from the `health_status` table, keyed by (task_name, data_source).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct HealthStatusRow {
    pub task_name: String,
    pub data_source: String,
    pub status: String,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub consecutive_failures: i32,
    pub average_runtime_seconds: Option<f64>,
    pub total_runs: i32,
    pub last_error: Option<String>,
}

impl HealthStatusRow {
    /// A fresh row for a task that has never run.
    #[must_use]
    pub fn new(task_name: &str, data_source: &str) -> Self {
        Self {
            task_name: task_name.to_string(),
            data_source: data_source.to_string(),
            status: "healthy".to_string(),
            last_run_at: None,
            last_success_at: None,
            consecutive_failures: 0,
            average_runtime_seconds: None,
            total_runs: 0,
            last_error: None,
        }
    }
}

const COLUMNS: &str = "task_name, data_source, status, last_run_at, last_success_at, \
     consecutive_failures, average_runtime_seconds, total_runs, last_error";

/// Fetches the health row for one (task, source) pair.
///
/// # Errors
///
/// Returns [`StoreError::Sqlx`] if the query fails.
pub async fn get_health(
    pool: &PgPool,
    task_name: &str,
    data_source: &str,
) -> Result<Option<HealthStatusRow>, StoreError> {
    let row = sqlx::query_as::<_, HealthStatusRow>(&format!(
        "SELECT {COLUMNS} FROM health_status \
         WHERE task_name = $1 AND data_source = $2"
    ))
    .bind(task_name)
    .bind(data_source)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Inserts or replaces the health row for its (task, source) pair.
///
/// # Errors
///
/// Returns [`StoreError::Sqlx`] if the upsert fails.
pub async fn upsert_health(pool: &PgPool, row: &HealthStatusRow) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO health_status \
             (task_name, data_source, status, last_run_at, last_success_at, \
              consecutive_failures, average_runtime_seconds, total_runs, last_error) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         ON CONFLICT (task_name, data_source) DO UPDATE SET \
             status                  = EXCLUDED.status, \
             last_run_at             = EXCLUDED.last_run_at, \
             last_success_at         = EXCLUDED.last_success_at, \
             consecutive_failures    = EXCLUDED.consecutive_failures, \
             average_runtime_seconds = EXCLUDED.average_runtime_seconds, \
             total_runs              = EXCLUDED.total_runs, \
             last_error              = EXCLUDED.last_error",
    )
    .bind(&row.task_name)
    .bind(&row.data_source)
    .bind(&row.status)
    .bind(row.last_run_at)
    .bind(row.last_success_at)
    .bind(row.consecutive_failures)
    .bind(row.average_runtime_seconds)
    .bind(row.total_runs)
    .bind(&row.last_error)
    .execute(pool)
    .await?;

    Ok(())
}

/// Returns all health rows, ordered by task name.
///
/// # Errors
///
/// Returns [`StoreError::Sqlx`] if the query fails.
pub async fn list_health(pool: &PgPool) -> Result<Vec<HealthStatusRow>, StoreError> {
    let rows = sqlx::query_as::<_, HealthStatusRow>(&format!(
        "SELECT {COLUMNS} FROM health_status ORDER BY task_name, data_source"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
