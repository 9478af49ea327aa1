//! One task execution: collector under retry, validation, persistence,
//! run record, health update.
//!
//! `TaskRunner::run` never propagates an error past its own boundary — the
//! orchestrator must continue with other tasks regardless of what happened
//! here, so every outcome is folded into the returned [`TaskReport`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use yjtrack_collect::{Collector, RetryPolicy};
use yjtrack_core::tasks::CollectionTask;
use yjtrack_store::{RunCounts, RunRecordRow, StorageGateway};

use crate::health::HealthRecorder;
use crate::validate::validate_dataset;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Outcome of one task execution.
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub task_name: String,
    pub data_source: String,
    pub status: TaskStatus,
    pub records_found: i32,
    pub records_processed: i32,
    pub records_inserted: i32,
    pub records_updated: i32,
    pub duration: Duration,
    pub error: Option<String>,
}

impl TaskReport {
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.status == TaskStatus::Failed
    }
}

/// Retry/back-off and alerting knobs shared by all tasks; the per-task
/// attempt count, timeout, and rate limit come from the task itself.
#[derive(Debug, Clone, Copy)]
pub struct RunnerConfig {
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    pub retry_max_jitter: Duration,
    pub alert_failure_threshold: u32,
}

struct RunFailure {
    message: String,
    counts: RunCounts,
}

pub struct TaskRunner {
    gateway: Arc<StorageGateway>,
    health: HealthRecorder,
    collectors: HashMap<String, Arc<dyn Collector>>,
    config: RunnerConfig,
}

impl TaskRunner {
    #[must_use]
    pub fn new(
        gateway: Arc<StorageGateway>,
        collectors: HashMap<String, Arc<dyn Collector>>,
        config: RunnerConfig,
    ) -> Self {
        let health = HealthRecorder::new(Arc::clone(&gateway), config.alert_failure_threshold);
        Self {
            gateway,
            health,
            collectors,
            config,
        }
    }

    #[must_use]
    pub fn health(&self) -> &HealthRecorder {
        &self.health
    }

    fn retry_policy(&self, task: &CollectionTask) -> RetryPolicy {
        RetryPolicy {
            max_attempts: task.max_attempts,
            base_delay: self.config.retry_base_delay,
            max_delay: self.config.retry_max_delay,
            max_jitter: self.config.retry_max_jitter,
            attempt_timeout: task.attempt_timeout(),
        }
    }

    /// Executes one task end to end and reports the outcome.
    pub async fn run(&self, task: &CollectionTask) -> TaskReport {
        let started = Instant::now();
        tracing::info!(task = %task.name, source = %task.data_source, "starting collection task");

        if let Err(e) = self.health.mark_running(task).await {
            tracing::error!(task = %task.name, error = %e, "failed to mark task as running");
        }

        let run = match self.gateway.open_run(&task.name, &task.data_source).await {
            Ok(run) => run,
            Err(e) => {
                // Both backends refused the open; nothing can be recorded.
                let message = format!("failed to open run record: {e}");
                tracing::error!(task = %task.name, error = %e, "run not recorded");
                self.record_failure_best_effort(task, &message).await;
                return self.report(task, TaskStatus::Failed, RunCounts::default(), started, Some(message));
            }
        };

        match self.execute(task).await {
            Ok(counts) => {
                if let Err(e) = self.gateway.complete_run(&run, &counts).await {
                    tracing::error!(run_id = run.id, error = %e, "failed to close run as completed");
                }
                let runtime = started.elapsed().as_secs_f64();
                if let Err(e) = self.health.record_success(task, runtime).await {
                    tracing::error!(task = %task.name, error = %e, "failed to record success");
                }
                tracing::info!(
                    task = %task.name,
                    records = counts.processed,
                    inserted = counts.inserted,
                    updated = counts.updated,
                    "collection task succeeded"
                );
                self.report(task, TaskStatus::Succeeded, counts, started, None)
            }
            Err(failure) => {
                self.fail_run_best_effort(&run, &failure).await;
                self.record_failure_best_effort(task, &failure.message).await;
                tracing::warn!(
                    task = %task.name,
                    error = %failure.message,
                    "collection task failed"
                );
                self.report(
                    task,
                    TaskStatus::Failed,
                    failure.counts,
                    started,
                    Some(failure.message),
                )
            }
        }
    }

    /// Collector → validator → storage. Returns the counts for the run
    /// record, or the failure that should close it.
    async fn execute(&self, task: &CollectionTask) -> Result<RunCounts, RunFailure> {
        let Some(collector) = self.collectors.get(&task.name) else {
            return Err(RunFailure {
                message: format!("no collector registered for task '{}'", task.name),
                counts: RunCounts::default(),
            });
        };

        let dataset = self
            .retry_policy(task)
            .run(|| collector.collect(task))
            .await
            .map_err(|e| RunFailure {
                message: e.to_string(),
                counts: RunCounts::default(),
            })?;

        let outcome = validate_dataset(dataset);
        let found = clamp_i32(outcome.found);
        let processed = clamp_i32(outcome.dataset.len());

        if outcome.found > 0 && outcome.dataset.is_empty() {
            return Err(RunFailure {
                message: format!(
                    "validation dropped all {} collected records",
                    outcome.found
                ),
                counts: RunCounts {
                    found,
                    ..RunCounts::default()
                },
            });
        }

        if outcome.dataset.is_empty() {
            // Source published nothing new; an empty run is still a success.
            return Ok(RunCounts::default());
        }

        let upserted = self
            .gateway
            .upsert_dataset(&outcome.dataset)
            .await
            .map_err(|e| RunFailure {
                message: format!("storage write failed: {e}"),
                counts: RunCounts {
                    found,
                    processed,
                    ..RunCounts::default()
                },
            })?;

        Ok(RunCounts {
            found,
            processed,
            inserted: upserted.inserted,
            updated: upserted.updated,
        })
    }

    fn report(
        &self,
        task: &CollectionTask,
        status: TaskStatus,
        counts: RunCounts,
        started: Instant,
        error: Option<String>,
    ) -> TaskReport {
        TaskReport {
            task_name: task.name.clone(),
            data_source: task.data_source.clone(),
            status,
            records_found: counts.found,
            records_processed: counts.processed,
            records_inserted: counts.inserted,
            records_updated: counts.updated,
            duration: started.elapsed(),
            error,
        }
    }

    /// Attempt to close the run as failed, logging any secondary error.
    async fn fail_run_best_effort(&self, run: &RunRecordRow, failure: &RunFailure) {
        if let Err(mark_err) = self
            .gateway
            .fail_run(run, &failure.message, &failure.counts)
            .await
        {
            tracing::error!(
                run_id = run.id,
                error = %mark_err,
                "failed to mark run as failed"
            );
        }
    }

    async fn record_failure_best_effort(&self, task: &CollectionTask, message: &str) {
        if let Err(e) = self.health.record_failure(task, message).await {
            tracing::error!(task = %task.name, error = %e, "failed to record failure in health status");
        }
    }
}

fn clamp_i32(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
