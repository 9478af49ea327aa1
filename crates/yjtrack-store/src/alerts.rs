//! Primary-store operations for the `alerts` side channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::StoreError;

/// A row from the `alerts` table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AlertRow {
    pub id: i64,
    pub task_name: String,
    pub data_source: String,
    pub severity: String,
    pub message: String,
    pub is_resolved: bool,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

const COLUMNS: &str =
    "id, task_name, data_source, severity, message, is_resolved, created_at, resolved_at";

/// Raises an alert unless an unresolved alert of the same severity is
/// already open for the (task, source) pair.
///
/// Returns the inserted row, or `None` when the alert was suppressed as a
/// duplicate.
///
/// # Errors
///
/// Returns [`StoreError::Sqlx`] if the insert fails.
pub async fn raise_alert(
    pool: &PgPool,
    task_name: &str,
    data_source: &str,
    severity: &str,
    message: &str,
) -> Result<Option<AlertRow>, StoreError> {
    let row = sqlx::query_as::<_, AlertRow>(&format!(
        "INSERT INTO alerts (task_name, data_source, severity, message) \
         SELECT $1, $2, $3, $4 \
         WHERE NOT EXISTS ( \
             SELECT 1 FROM alerts \
             WHERE task_name = $1 AND data_source = $2 \
               AND severity = $3 AND NOT is_resolved) \
         RETURNING {COLUMNS}"
    ))
    .bind(task_name)
    .bind(data_source)
    .bind(severity)
    .bind(message)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Resolves every open alert for the (task, source) pair.
///
/// Returns the number of alerts resolved.
///
/// # Errors
///
/// Returns [`StoreError::Sqlx`] if the update fails.
pub async fn resolve_alerts(
    pool: &PgPool,
    task_name: &str,
    data_source: &str,
) -> Result<u64, StoreError> {
    let result = sqlx::query(
        "UPDATE alerts \
         SET is_resolved = TRUE, resolved_at = NOW() \
         WHERE task_name = $1 AND data_source = $2 AND NOT is_resolved",
    )
    .bind(task_name)
    .bind(data_source)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Lists alerts, newest first. With `include_resolved = false` only open
/// alerts are returned.
///
/// # Errors
///
/// Returns [`StoreError::Sqlx`] if the query fails.
pub async fn list_alerts(
    pool: &PgPool,
    include_resolved: bool,
    limit: i64,
) -> Result<Vec<AlertRow>, StoreError> {
    let rows = sqlx::query_as::<_, AlertRow>(&format!(
        "SELECT {COLUMNS} FROM alerts \
         WHERE is_resolved = FALSE OR $1 \
         ORDER BY created_at DESC, id DESC \
         LIMIT $2"
    ))
    .bind(include_resolved)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
