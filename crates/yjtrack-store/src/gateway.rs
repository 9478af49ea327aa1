//! Dual-backend storage gateway.
//!
//! Every operation is attempted against the primary Postgres pool first.
//! The first backend-level primary error latches `using_fallback` for the
//! remainder of the process lifetime and the call is replayed against the
//! local [`FileStore`]. Logic errors (invalid run transitions) are never
//! failed over — they mean the caller is wrong, not the backend.
//!
//! The gateway is safe for concurrent use. Writes are idempotent upserts
//! keyed by natural key; concurrent writers to the same key converge to
//! last-write-wins with no conflict detection.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use yjtrack_core::records::{BudgetAllocation, Dataset, ParliamentaryDocument, YouthStatistic};

use crate::alerts::{self, AlertRow};
use crate::datasets::{self, UpsertCounts};
use crate::fallback::FileStore;
use crate::health::{self, HealthStatusRow};
use crate::runs::{self, RunCounts, RunRecordRow};
use crate::StoreError;

pub struct StorageGateway {
    primary: Option<PgPool>,
    fallback: FileStore,
    using_fallback: AtomicBool,
}

impl StorageGateway {
    /// Builds a gateway over an optional primary pool and a fallback store.
    ///
    /// With no primary pool the gateway starts latched onto the fallback.
    #[must_use]
    pub fn new(primary: Option<PgPool>, fallback: FileStore) -> Self {
        let no_primary = primary.is_none();
        if no_primary {
            tracing::warn!(
                fallback = %fallback.path().display(),
                "no primary store configured — using local fallback store"
            );
        }
        Self {
            primary,
            fallback,
            using_fallback: AtomicBool::new(no_primary),
        }
    }

    #[must_use]
    pub fn is_using_fallback(&self) -> bool {
        self.using_fallback.load(Ordering::Relaxed)
    }

    fn primary(&self) -> Option<&PgPool> {
        if self.is_using_fallback() {
            None
        } else {
            self.primary.as_ref()
        }
    }

    /// Latch onto the fallback store. Logged once, on the first trip.
    fn trip_fallback(&self, operation: &'static str, err: &StoreError) {
        if !self.using_fallback.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                operation,
                error = %err,
                fallback = %self.fallback.path().display(),
                "primary store error — switching to fallback store for the rest of this process"
            );
        }
    }

    /// Backend-level failures fail over; logic errors propagate.
    fn is_backend_error(err: &StoreError) -> bool {
        matches!(err, StoreError::Sqlx(_))
    }

    // -----------------------------------------------------------------------
    // Run records
    // -----------------------------------------------------------------------

    /// Opens a run in `started` status.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if both backends fail the write.
    pub async fn open_run(
        &self,
        task_name: &str,
        data_source: &str,
    ) -> Result<RunRecordRow, StoreError> {
        if let Some(pool) = self.primary() {
            match runs::open_run(pool, task_name, data_source).await {
                Ok(row) => return Ok(row),
                Err(e) if Self::is_backend_error(&e) => self.trip_fallback("open_run", &e),
                Err(e) => return Err(e),
            }
        }
        self.fallback_open_run(task_name, data_source)
    }

    /// Closes a run as `completed`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidTransition`] if the run was already
    /// closed, or [`StoreError`] if both backends fail the write.
    pub async fn complete_run(
        &self,
        run: &RunRecordRow,
        counts: &RunCounts,
    ) -> Result<(), StoreError> {
        if let Some(pool) = self.primary() {
            match runs::complete_run(pool, run.id, counts).await {
                Ok(()) => return Ok(()),
                Err(e) if Self::is_backend_error(&e) => self.trip_fallback("complete_run", &e),
                Err(e) => return Err(e),
            }
        }
        self.fallback_close_run(run, "completed", None, counts)
    }

    /// Closes a run as `failed` with an error message.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidTransition`] if the run was already
    /// closed, or [`StoreError`] if both backends fail the write.
    pub async fn fail_run(
        &self,
        run: &RunRecordRow,
        error_message: &str,
        counts: &RunCounts,
    ) -> Result<(), StoreError> {
        if let Some(pool) = self.primary() {
            match runs::fail_run(pool, run.id, error_message, counts).await {
                Ok(()) => return Ok(()),
                Err(e) if Self::is_backend_error(&e) => self.trip_fallback("fail_run", &e),
                Err(e) => return Err(e),
            }
        }
        self.fallback_close_run(run, "failed", Some(error_message), counts)
    }

    /// Returns the most recent runs, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if both backends fail the read.
    pub async fn list_runs(&self, limit: usize) -> Result<Vec<RunRecordRow>, StoreError> {
        if let Some(pool) = self.primary() {
            match runs::list_runs(pool, to_i64(limit)).await {
                Ok(rows) => return Ok(rows),
                Err(e) if Self::is_backend_error(&e) => self.trip_fallback("list_runs", &e),
                Err(e) => return Err(e),
            }
        }
        let mut rows: Vec<RunRecordRow> = self.fallback_rows("run_records")?;
        rows.sort_by(|a, b| (b.started_at, b.id).cmp(&(a.started_at, a.id)));
        rows.truncate(limit);
        Ok(rows)
    }

    // -----------------------------------------------------------------------
    // Health status
    // -----------------------------------------------------------------------

    /// Fetches the health row for one (task, source) pair.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if both backends fail the read.
    pub async fn get_health(
        &self,
        task_name: &str,
        data_source: &str,
    ) -> Result<Option<HealthStatusRow>, StoreError> {
        if let Some(pool) = self.primary() {
            match health::get_health(pool, task_name, data_source).await {
                Ok(row) => return Ok(row),
                Err(e) if Self::is_backend_error(&e) => self.trip_fallback("get_health", &e),
                Err(e) => return Err(e),
            }
        }
        let key = health_key(task_name, data_source);
        let doc = self.fallback_rows::<HealthStatusRow>("health_status")?;
        Ok(doc
            .into_iter()
            .find(|row| health_key(&row.task_name, &row.data_source) == key))
    }

    /// Inserts or replaces the health row for its (task, source) pair.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if both backends fail the write.
    pub async fn upsert_health(&self, row: &HealthStatusRow) -> Result<(), StoreError> {
        if let Some(pool) = self.primary() {
            match health::upsert_health(pool, row).await {
                Ok(()) => return Ok(()),
                Err(e) if Self::is_backend_error(&e) => self.trip_fallback("upsert_health", &e),
                Err(e) => return Err(e),
            }
        }
        let key = health_key(&row.task_name, &row.data_source);
        let value = serde_json::to_value(row)?;
        self.fallback.update(|doc| {
            doc.collection_mut("health_status").insert(key, value);
            Ok(())
        })
    }

    /// Returns all health rows, ordered by task name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if both backends fail the read.
    pub async fn list_health(&self) -> Result<Vec<HealthStatusRow>, StoreError> {
        if let Some(pool) = self.primary() {
            match health::list_health(pool).await {
                Ok(rows) => return Ok(rows),
                Err(e) if Self::is_backend_error(&e) => self.trip_fallback("list_health", &e),
                Err(e) => return Err(e),
            }
        }
        let mut rows: Vec<HealthStatusRow> = self.fallback_rows("health_status")?;
        rows.sort_by(|a, b| {
            (&a.task_name, &a.data_source).cmp(&(&b.task_name, &b.data_source))
        });
        Ok(rows)
    }

    // -----------------------------------------------------------------------
    // Alerts
    // -----------------------------------------------------------------------

    /// Raises an alert unless the same-severity alert is already open for
    /// the pair. Returns `None` when suppressed as a duplicate.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if both backends fail the write.
    pub async fn raise_alert(
        &self,
        task_name: &str,
        data_source: &str,
        severity: &str,
        message: &str,
    ) -> Result<Option<AlertRow>, StoreError> {
        if let Some(pool) = self.primary() {
            match alerts::raise_alert(pool, task_name, data_source, severity, message).await {
                Ok(row) => return Ok(row),
                Err(e) if Self::is_backend_error(&e) => self.trip_fallback("raise_alert", &e),
                Err(e) => return Err(e),
            }
        }
        self.fallback_raise_alert(task_name, data_source, severity, message)
    }

    /// Resolves every open alert for the pair; returns how many.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if both backends fail the write.
    pub async fn resolve_alerts(
        &self,
        task_name: &str,
        data_source: &str,
    ) -> Result<u64, StoreError> {
        if let Some(pool) = self.primary() {
            match alerts::resolve_alerts(pool, task_name, data_source).await {
                Ok(count) => return Ok(count),
                Err(e) if Self::is_backend_error(&e) => self.trip_fallback("resolve_alerts", &e),
                Err(e) => return Err(e),
            }
        }
        let now = Utc::now();
        self.fallback.update(|doc| {
            let mut resolved = 0u64;
            for value in doc.collection_mut("alerts").values_mut() {
                let mut alert: AlertRow = serde_json::from_value(value.clone())?;
                if alert.task_name == task_name
                    && alert.data_source == data_source
                    && !alert.is_resolved
                {
                    alert.is_resolved = true;
                    alert.resolved_at = Some(now);
                    resolved += 1;
                    *value = serde_json::to_value(&alert)?;
                }
            }
            Ok(resolved)
        })
    }

    /// Lists alerts, newest first; open alerts only unless `include_resolved`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if both backends fail the read.
    pub async fn list_alerts(
        &self,
        include_resolved: bool,
        limit: usize,
    ) -> Result<Vec<AlertRow>, StoreError> {
        if let Some(pool) = self.primary() {
            match alerts::list_alerts(pool, include_resolved, to_i64(limit)).await {
                Ok(rows) => return Ok(rows),
                Err(e) if Self::is_backend_error(&e) => self.trip_fallback("list_alerts", &e),
                Err(e) => return Err(e),
            }
        }
        let mut rows: Vec<AlertRow> = self
            .fallback_rows("alerts")?
            .into_iter()
            .filter(|row: &AlertRow| include_resolved || !row.is_resolved)
            .collect();
        rows.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        rows.truncate(limit);
        Ok(rows)
    }

    // -----------------------------------------------------------------------
    // Datasets
    // -----------------------------------------------------------------------

    /// Upserts a whole dataset by natural key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if both backends fail the write.
    pub async fn upsert_dataset(&self, dataset: &Dataset) -> Result<UpsertCounts, StoreError> {
        if let Some(pool) = self.primary() {
            match datasets::upsert_dataset(pool, dataset).await {
                Ok(counts) => return Ok(counts),
                Err(e) if Self::is_backend_error(&e) => self.trip_fallback("upsert_dataset", &e),
                Err(e) => return Err(e),
            }
        }
        self.fallback_upsert_dataset(dataset)
    }

    /// Returns the most recent youth statistics, newest date first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if both backends fail the read.
    pub async fn list_youth_statistics(
        &self,
        limit: usize,
    ) -> Result<Vec<YouthStatistic>, StoreError> {
        if let Some(pool) = self.primary() {
            match datasets::list_youth_statistics(pool, to_i64(limit)).await {
                Ok(rows) => return Ok(rows),
                Err(e) if Self::is_backend_error(&e) => {
                    self.trip_fallback("list_youth_statistics", &e);
                }
                Err(e) => return Err(e),
            }
        }
        let mut rows: Vec<YouthStatistic> = self.fallback_rows("youth_statistics")?;
        rows.sort_by(|a, b| b.date.cmp(&a.date).then(a.facility_name.cmp(&b.facility_name)));
        rows.truncate(limit);
        Ok(rows)
    }

    /// Returns budget allocations, newest fiscal year first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if both backends fail the read.
    pub async fn list_budget_allocations(
        &self,
        limit: usize,
    ) -> Result<Vec<BudgetAllocation>, StoreError> {
        if let Some(pool) = self.primary() {
            match datasets::list_budget_allocations(pool, to_i64(limit)).await {
                Ok(rows) => return Ok(rows),
                Err(e) if Self::is_backend_error(&e) => {
                    self.trip_fallback("list_budget_allocations", &e);
                }
                Err(e) => return Err(e),
            }
        }
        let mut rows: Vec<BudgetAllocation> = self.fallback_rows("budget_allocations")?;
        rows.sort_by(|a, b| b.fiscal_year.cmp(&a.fiscal_year).then(a.program.cmp(&b.program)));
        rows.truncate(limit);
        Ok(rows)
    }

    /// Returns parliamentary documents, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if both backends fail the read.
    pub async fn list_parliamentary_documents(
        &self,
        limit: usize,
    ) -> Result<Vec<ParliamentaryDocument>, StoreError> {
        if let Some(pool) = self.primary() {
            match datasets::list_parliamentary_documents(pool, to_i64(limit)).await {
                Ok(rows) => return Ok(rows),
                Err(e) if Self::is_backend_error(&e) => {
                    self.trip_fallback("list_parliamentary_documents", &e);
                }
                Err(e) => return Err(e),
            }
        }
        let mut rows: Vec<ParliamentaryDocument> = self.fallback_rows("parliamentary_documents")?;
        rows.sort_by(|a, b| b.date.cmp(&a.date));
        rows.truncate(limit);
        Ok(rows)
    }

    // -----------------------------------------------------------------------
    // Fallback implementations
    // -----------------------------------------------------------------------

    fn fallback_rows<T: DeserializeOwned>(&self, table: &str) -> Result<Vec<T>, StoreError> {
        let values = self.fallback.select_all(table)?;
        Ok(values
            .into_iter()
            .filter_map(|value| {
                serde_json::from_value(value)
                    .map_err(|e| {
                        tracing::warn!(table, error = %e, "skipping malformed fallback record");
                    })
                    .ok()
            })
            .collect())
    }

    fn fallback_open_run(
        &self,
        task_name: &str,
        data_source: &str,
    ) -> Result<RunRecordRow, StoreError> {
        self.fallback.update(|doc| {
            let id = doc.next_id("run_records");
            let row = RunRecordRow {
                id,
                public_id: Uuid::new_v4(),
                task_name: task_name.to_string(),
                data_source: data_source.to_string(),
                status: "started".to_string(),
                started_at: Utc::now(),
                completed_at: None,
                duration_seconds: None,
                records_found: 0,
                records_processed: 0,
                records_inserted: 0,
                records_updated: 0,
                error_message: None,
            };
            doc.collection_mut("run_records")
                .insert(run_key(id), serde_json::to_value(&row)?);
            Ok(row)
        })
    }

    /// Close a run in the fallback store. If the run was opened on the
    /// primary before the failover, no fallback row exists yet — the closed
    /// row is synthesized from the opened row so no run is lost.
    fn fallback_close_run(
        &self,
        run: &RunRecordRow,
        status: &str,
        error_message: Option<&str>,
        counts: &RunCounts,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        self.fallback.update(|doc| {
            let key = run_key(run.id);
            let existing = doc.collection_mut("run_records").get(&key).cloned();
            let mut row = match existing {
                Some(value) => {
                    let existing: RunRecordRow = serde_json::from_value(value)?;
                    if existing.status != "started" {
                        return Err(StoreError::InvalidTransition {
                            id: run.id,
                            expected_status: "started",
                        });
                    }
                    existing
                }
                None => {
                    // Keep the id counter ahead of primary-minted ids.
                    let counter = doc.counters.entry("run_records".to_string()).or_insert(0);
                    *counter = (*counter).max(run.id);
                    run.clone()
                }
            };

            row.status = status.to_string();
            row.completed_at = Some(now);
            #[allow(clippy::cast_precision_loss)]
            let elapsed_ms = (now - row.started_at).num_milliseconds() as f64;
            row.duration_seconds = Some(elapsed_ms / 1000.0);
            row.records_found = counts.found;
            row.records_processed = counts.processed;
            row.records_inserted = counts.inserted;
            row.records_updated = counts.updated;
            row.error_message = error_message.map(str::to_string);

            doc.collection_mut("run_records")
                .insert(key, serde_json::to_value(&row)?);
            Ok(())
        })
    }

    fn fallback_raise_alert(
        &self,
        task_name: &str,
        data_source: &str,
        severity: &str,
        message: &str,
    ) -> Result<Option<AlertRow>, StoreError> {
        self.fallback.update(|doc| {
            let duplicate = doc
                .collection_mut("alerts")
                .values()
                .filter_map(|value| serde_json::from_value::<AlertRow>(value.clone()).ok())
                .any(|alert| {
                    alert.task_name == task_name
                        && alert.data_source == data_source
                        && alert.severity == severity
                        && !alert.is_resolved
                });
            if duplicate {
                return Ok(None);
            }

            let id = doc.next_id("alerts");
            let row = AlertRow {
                id,
                task_name: task_name.to_string(),
                data_source: data_source.to_string(),
                severity: severity.to_string(),
                message: message.to_string(),
                is_resolved: false,
                created_at: Utc::now(),
                resolved_at: None,
            };
            doc.collection_mut("alerts")
                .insert(run_key(id), serde_json::to_value(&row)?);
            Ok(Some(row))
        })
    }

    fn fallback_upsert_dataset(&self, dataset: &Dataset) -> Result<UpsertCounts, StoreError> {
        let table = dataset.table();
        let entries: Vec<(String, Value)> = match dataset {
            Dataset::YouthStatistics(records) => keyed_values(records, YouthStatistic::natural_key)?,
            Dataset::BudgetAllocations(records) => {
                keyed_values(records, BudgetAllocation::natural_key)?
            }
            Dataset::ParliamentaryDocuments(records) => {
                keyed_values(records, ParliamentaryDocument::natural_key)?
            }
        };

        self.fallback.update(|doc| {
            let collection = doc.collection_mut(table);
            let mut counts = UpsertCounts::default();
            for (key, value) in entries {
                if collection.insert(key, value).is_some() {
                    counts.updated += 1;
                } else {
                    counts.inserted += 1;
                }
            }
            Ok(counts)
        })
    }
}

fn keyed_values<T: serde::Serialize>(
    records: &[T],
    key: impl Fn(&T) -> String,
) -> Result<Vec<(String, Value)>, StoreError> {
    records
        .iter()
        .map(|record| Ok((key(record), serde_json::to_value(record)?)))
        .collect()
}

fn run_key(id: i64) -> String {
    // Zero-padded so BTreeMap key order matches insertion order.
    format!("{id:020}")
}

fn health_key(task_name: &str, data_source: &str) -> String {
    format!("{task_name}|{data_source}")
}

fn to_i64(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}
