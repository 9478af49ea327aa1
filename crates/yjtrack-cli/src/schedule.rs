//! Background cron scheduler.
//!
//! `yjtrack schedule` runs in the foreground: a daily collection run on
//! the configured cron expression, plus an hourly staleness sweep over the
//! health rows. The orchestrator's single-flight guard means a scheduled
//! run that overlaps a still-running one is skipped, not queued.

use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler};

use yjtrack_core::tasks::CollectionTask;
use yjtrack_core::AppConfig;
use yjtrack_engine::{EngineError, Orchestrator};

use crate::commands;

/// Builds and runs the scheduler until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the roster cannot be loaded, the orchestrator cannot
/// be wired, or the scheduler fails to start.
pub async fn run_scheduler(config: AppConfig) -> anyhow::Result<()> {
    let roster = yjtrack_core::load_tasks(&config.tasks_path)?;
    let tasks: Arc<Vec<CollectionTask>> = Arc::new(roster.tasks);

    let gateway = commands::build_gateway(&config).await;
    let orchestrator = Arc::new(commands::build_orchestrator(&config, gateway, &tasks)?);

    let mut scheduler = JobScheduler::new().await?;

    let collect_job = {
        let orchestrator = Arc::clone(&orchestrator);
        let tasks = Arc::clone(&tasks);
        Job::new_async(config.schedule_cron.as_str(), move |_id, _scheduler| {
            let orchestrator = Arc::clone(&orchestrator);
            let tasks = Arc::clone(&tasks);
            Box::pin(async move {
                match orchestrator.run_all(&tasks).await {
                    Ok(summary) => tracing::info!(
                        succeeded = summary.succeeded,
                        failed = summary.failed,
                        records = summary.total_records,
                        "scheduled collection run finished"
                    ),
                    Err(EngineError::AlreadyRunning) => {
                        tracing::warn!("skipping scheduled run — previous run still in progress");
                    }
                }
            })
        })?
    };
    scheduler.add(collect_job).await?;

    let staleness_job = {
        let orchestrator: Arc<Orchestrator> = Arc::clone(&orchestrator);
        let tasks = Arc::clone(&tasks);
        Job::new_async("0 0 * * * *", move |_id, _scheduler| {
            let orchestrator = Arc::clone(&orchestrator);
            let tasks = Arc::clone(&tasks);
            Box::pin(async move {
                match orchestrator.runner().health().check_staleness(&tasks).await {
                    Ok(alerts) if !alerts.is_empty() => {
                        tracing::warn!(count = alerts.len(), "staleness sweep raised alerts");
                    }
                    Ok(_) => tracing::debug!("staleness sweep clean"),
                    Err(e) => tracing::error!(error = %e, "staleness sweep failed"),
                }
            })
        })?
    };
    scheduler.add(staleness_job).await?;

    scheduler.start().await?;
    tracing::info!(
        cron = %config.schedule_cron,
        tasks = tasks.len(),
        "scheduler started — press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await?;
    scheduler.shutdown().await?;
    Ok(())
}
