//! Health rollup maintenance and alerting.
//!
//! The health row for a (task, source) pair is the incremental fold of its
//! run history: consecutive failures, last run/success timestamps, and a
//! running average of successful runtimes. Alerts are raised when failures
//! cross the configured threshold (critical at twice the threshold) and
//! when a task goes stale relative to its expected cadence.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};

use yjtrack_core::tasks::CollectionTask;
use yjtrack_store::{AlertRow, HealthStatusRow, StorageGateway, StoreError};

/// Window for the running average of successful runtimes.
const AVERAGE_WINDOW_RUNS: i32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    Warning,
    Error,
    Running,
}

impl HealthState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HealthState::Healthy => "healthy",
            HealthState::Warning => "warning",
            HealthState::Error => "error",
            HealthState::Running => "running",
        }
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub struct HealthRecorder {
    gateway: Arc<StorageGateway>,
    failure_threshold: u32,
}

impl HealthRecorder {
    #[must_use]
    pub fn new(gateway: Arc<StorageGateway>, failure_threshold: u32) -> Self {
        Self {
            gateway,
            failure_threshold: failure_threshold.max(1),
        }
    }

    async fn current_row(&self, task: &CollectionTask) -> Result<HealthStatusRow, StoreError> {
        Ok(self
            .gateway
            .get_health(&task.name, &task.data_source)
            .await?
            .unwrap_or_else(|| HealthStatusRow::new(&task.name, &task.data_source)))
    }

    /// Marks the pair as running; called when a task runner begins.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the health row cannot be written.
    pub async fn mark_running(&self, task: &CollectionTask) -> Result<(), StoreError> {
        let mut row = self.current_row(task).await?;
        row.status = HealthState::Running.as_str().to_string();
        row.last_run_at = Some(Utc::now());
        self.gateway.upsert_health(&row).await
    }

    /// Records a successful run: healthy status, failure counter reset,
    /// running average updated, open alerts resolved.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the health row or alerts cannot be written.
    pub async fn record_success(
        &self,
        task: &CollectionTask,
        runtime_secs: f64,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut row = self.current_row(task).await?;
        row.status = HealthState::Healthy.as_str().to_string();
        row.last_run_at = Some(now);
        row.last_success_at = Some(now);
        row.consecutive_failures = 0;
        row.last_error = None;
        row.total_runs = row.total_runs.saturating_add(1);
        row.average_runtime_seconds = Some(match row.average_runtime_seconds {
            None => runtime_secs,
            Some(avg) => {
                let window = f64::from(row.total_runs.min(AVERAGE_WINDOW_RUNS));
                avg + (runtime_secs - avg) / window
            }
        });
        self.gateway.upsert_health(&row).await?;

        let resolved = self
            .gateway
            .resolve_alerts(&task.name, &task.data_source)
            .await?;
        if resolved > 0 {
            tracing::info!(
                task = %task.name,
                resolved,
                "task recovered — resolved open alerts"
            );
        }
        Ok(())
    }

    /// Records a failed run: error status, failure counter incremented, and
    /// an alert when the counter crosses the threshold.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the health row or alert cannot be written.
    pub async fn record_failure(
        &self,
        task: &CollectionTask,
        error: &str,
    ) -> Result<(), StoreError> {
        let mut row = self.current_row(task).await?;
        row.status = HealthState::Error.as_str().to_string();
        row.last_run_at = Some(Utc::now());
        row.consecutive_failures = row.consecutive_failures.saturating_add(1);
        row.last_error = Some(error.to_string());
        row.total_runs = row.total_runs.saturating_add(1);
        self.gateway.upsert_health(&row).await?;

        let failures = u32::try_from(row.consecutive_failures).unwrap_or(0);
        if failures >= self.failure_threshold {
            let severity = if failures >= self.failure_threshold * 2 {
                "critical"
            } else {
                "warning"
            };
            let message = format!(
                "{failures} consecutive failures; last error: {error}"
            );
            if let Some(alert) = self
                .gateway
                .raise_alert(&task.name, &task.data_source, severity, &message)
                .await?
            {
                tracing::warn!(
                    task = %task.name,
                    severity = %alert.severity,
                    failures,
                    "raised failure alert"
                );
            }
        }
        Ok(())
    }

    /// Sweeps all tasks for staleness: a task whose last success is older
    /// than its expected cadence gets a warning alert and a `warning`
    /// health status. Returns the alerts raised by this sweep.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if reads or writes fail on both backends.
    pub async fn check_staleness(
        &self,
        tasks: &[CollectionTask],
    ) -> Result<Vec<AlertRow>, StoreError> {
        let now = Utc::now();
        let mut raised = Vec::new();

        for task in tasks {
            let Some(mut row) = self.gateway.get_health(&task.name, &task.data_source).await?
            else {
                continue;
            };
            let Some(last_success) = row.last_success_at else {
                continue;
            };

            let cadence = ChronoDuration::hours(i64::from(task.expected_cadence_hours));
            let age = now - last_success;
            if age <= cadence {
                continue;
            }

            let message = format!(
                "no successful run for {}h (expected cadence {}h)",
                age.num_hours(),
                task.expected_cadence_hours
            );
            if let Some(alert) = self
                .gateway
                .raise_alert(&task.name, &task.data_source, "warning", &message)
                .await?
            {
                tracing::warn!(task = %task.name, %message, "task is stale");
                raised.push(alert);
            }

            if row.status == HealthState::Healthy.as_str() {
                row.status = HealthState::Warning.as_str().to_string();
                self.gateway.upsert_health(&row).await?;
            }
        }

        Ok(raised)
    }
}
