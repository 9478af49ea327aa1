//! Batching orchestrator.
//!
//! Tasks run in strictly sequential batches of at most `max_concurrent`;
//! within a batch all runners execute concurrently and the batch completes
//! when the slowest finishes. A politeness delay separates batches. After
//! the first full pass, the failed subset gets exactly one more pass.
//! `run_all` is single-flight: a second concurrent invocation is rejected.

use std::collections::HashMap;
use std::time::Duration;

use futures::future::join_all;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;

use yjtrack_core::tasks::CollectionTask;

use crate::runner::{TaskReport, TaskRunner, TaskStatus};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("a collection run is already in progress")]
    AlreadyRunning,
}

/// Aggregate outcome of one `run_all` invocation.
#[derive(Debug)]
pub struct RunSummary {
    pub total_tasks: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub total_records: i64,
    pub duration: Duration,
    /// Final per-task reports, in roster order. A task retried in the
    /// second pass appears with its latest outcome.
    pub reports: Vec<TaskReport>,
}

pub struct Orchestrator {
    runner: TaskRunner,
    max_concurrent: usize,
    inter_batch_delay: Duration,
    running: Mutex<()>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(runner: TaskRunner, max_concurrent: usize, inter_batch_delay: Duration) -> Self {
        Self {
            runner,
            max_concurrent: max_concurrent.max(1),
            inter_batch_delay,
            running: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn runner(&self) -> &TaskRunner {
        &self.runner
    }

    /// Runs every task in batches, retries the failed subset once, and
    /// aggregates a summary.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AlreadyRunning`] if another `run_all` is in
    /// flight on this orchestrator. Individual task failures never surface
    /// as errors — they are reported in the summary.
    pub async fn run_all(&self, tasks: &[CollectionTask]) -> Result<RunSummary, EngineError> {
        let _guard = self
            .running
            .try_lock()
            .map_err(|_| EngineError::AlreadyRunning)?;

        let started = Instant::now();
        let mut latest: HashMap<String, TaskReport> = HashMap::new();

        tracing::info!(
            total = tasks.len(),
            max_concurrent = self.max_concurrent,
            "starting collection run"
        );

        self.run_batches(tasks.iter().collect::<Vec<_>>(), &mut latest, false)
            .await;

        let failed: Vec<&CollectionTask> = tasks
            .iter()
            .filter(|task| latest.get(&task.name).is_some_and(TaskReport::is_failed))
            .collect();

        if !failed.is_empty() {
            tracing::info!(failed = failed.len(), "retrying failed tasks once");
            self.run_batches(failed, &mut latest, true).await;
        }

        let reports: Vec<TaskReport> = tasks
            .iter()
            .filter_map(|task| latest.remove(&task.name))
            .collect();

        let succeeded = reports
            .iter()
            .filter(|r| r.status == TaskStatus::Succeeded)
            .count();
        let failed = reports.len() - succeeded;
        let total_records = reports
            .iter()
            .map(|r| i64::from(r.records_processed))
            .sum();

        let summary = RunSummary {
            total_tasks: tasks.len(),
            succeeded,
            failed,
            total_records,
            duration: started.elapsed(),
            reports,
        };

        tracing::info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            records = summary.total_records,
            "collection run finished"
        );

        Ok(summary)
    }

    /// Runs `tasks` in sequential batches of `max_concurrent`, waiting the
    /// politeness delay before every batch after the very first of the
    /// whole invocation (`delay_first` covers the retry pass, which always
    /// follows an earlier batch).
    async fn run_batches(
        &self,
        tasks: Vec<&CollectionTask>,
        latest: &mut HashMap<String, TaskReport>,
        delay_first: bool,
    ) {
        for (index, batch) in tasks.chunks(self.max_concurrent).enumerate() {
            if (index > 0 || delay_first) && !self.inter_batch_delay.is_zero() {
                tokio::time::sleep(self.inter_batch_delay).await;
            }

            tracing::debug!(batch = index + 1, size = batch.len(), "running batch");
            let reports = join_all(batch.iter().map(|task| self.runner.run(task))).await;

            for report in reports {
                latest.insert(report.task_name.clone(), report);
            }
        }
    }
}
