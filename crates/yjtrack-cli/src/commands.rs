//! Command handlers for the CLI.
//!
//! These are called from `main` after config loading. Per-task failures are
//! captured in the run summary rather than propagated; a non-zero exit is
//! produced only when tasks remain failed after the retry pass, or when
//! startup wiring itself fails.

use std::sync::Arc;
use std::time::Duration;

use yjtrack_core::tasks::CollectionTask;
use yjtrack_core::AppConfig;
use yjtrack_engine::{Orchestrator, RunSummary, RunnerConfig, TaskRunner, TaskStatus};
use yjtrack_store::{FileStore, PoolConfig, StorageGateway};

/// Load the task roster, optionally filtered to a single task by name.
fn load_roster(
    config: &AppConfig,
    task_filter: Option<&str>,
) -> anyhow::Result<Vec<CollectionTask>> {
    let roster = yjtrack_core::load_tasks(&config.tasks_path)?;

    match task_filter {
        Some(name) => {
            let task = roster
                .tasks
                .into_iter()
                .find(|t| t.name == name)
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "task '{name}' not found in {}",
                        config.tasks_path.display()
                    )
                })?;
            Ok(vec![task])
        }
        None => Ok(roster.tasks),
    }
}

/// Connect the primary pool (if configured and reachable) and wrap it with
/// the fallback store. A missing or unreachable primary is not fatal — the
/// gateway starts latched onto the fallback.
pub(crate) async fn build_gateway(config: &AppConfig) -> Arc<StorageGateway> {
    let pool_config = PoolConfig {
        max_connections: config.db_max_connections,
        min_connections: config.db_min_connections,
        acquire_timeout_secs: config.db_acquire_timeout_secs,
    };

    let primary = match &config.database_url {
        Some(url) => match yjtrack_store::connect_pool(url, pool_config).await {
            Ok(pool) => Some(pool),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "cannot connect to primary store — starting on the fallback store"
                );
                None
            }
        },
        None => None,
    };

    Arc::new(StorageGateway::new(
        primary,
        FileStore::new(config.fallback_path.clone()),
    ))
}

pub(crate) fn build_orchestrator(
    config: &AppConfig,
    gateway: Arc<StorageGateway>,
    tasks: &[CollectionTask],
) -> anyhow::Result<Orchestrator> {
    let collectors = crate::sources::build_collectors(config, tasks)?;
    let runner = TaskRunner::new(
        gateway,
        collectors,
        RunnerConfig {
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
            retry_max_delay: Duration::from_millis(config.retry_max_delay_ms),
            retry_max_jitter: Duration::from_millis(config.retry_max_jitter_ms),
            alert_failure_threshold: config.alert_failure_threshold,
        },
    );
    Ok(Orchestrator::new(
        runner,
        config.max_concurrent_tasks,
        Duration::from_secs(config.inter_batch_delay_secs),
    ))
}

/// `yjtrack run [TASK]` — run the roster (or one task) and print a summary.
///
/// # Errors
///
/// Returns an error (non-zero exit) when the task filter resolves to
/// nothing, wiring fails, or any task is still failed after the retry pass.
pub async fn run(
    config: &AppConfig,
    task_filter: Option<&str>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let tasks = load_roster(config, task_filter)?;

    if dry_run {
        println!("dry-run: would collect {} tasks:", tasks.len());
        for task in &tasks {
            println!("  - {} ({} from {})", task.name, task.kind, task.url);
        }
        return Ok(());
    }

    let gateway = build_gateway(config).await;
    let orchestrator = build_orchestrator(config, Arc::clone(&gateway), &tasks)?;

    let summary = orchestrator.run_all(&tasks).await?;
    print_summary(&summary);

    if gateway.is_using_fallback() {
        println!("note: results were written to the local fallback store");
    }

    if summary.failed > 0 {
        anyhow::bail!("{} of {} tasks failed", summary.failed, summary.total_tasks);
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("| task | status | found | processed | inserted | updated | error |");
    println!("|------|--------|-------|-----------|----------|---------|-------|");
    for report in &summary.reports {
        let status = match report.status {
            TaskStatus::Succeeded => "ok",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Pending | TaskStatus::Running => "?",
        };
        let error = report.error.as_deref().unwrap_or("\u{2014}").replace('|', "\\|");
        println!(
            "| {} | {} | {} | {} | {} | {} | {} |",
            report.task_name,
            status,
            report.records_found,
            report.records_processed,
            report.records_inserted,
            report.records_updated,
            error
        );
    }
    println!();
    println!(
        "{} succeeded, {} failed, {} records in {:.1}s",
        summary.succeeded,
        summary.failed,
        summary.total_records,
        summary.duration.as_secs_f64()
    );
}

/// `yjtrack health` — print current health rows.
///
/// # Errors
///
/// Returns an error if both storage backends fail the read.
pub async fn health(config: &AppConfig) -> anyhow::Result<()> {
    let gateway = build_gateway(config).await;
    let rows = gateway.list_health().await?;

    if rows.is_empty() {
        println!("no tasks have run yet");
        return Ok(());
    }

    println!("| task | source | status | failures | last success | avg runtime |");
    println!("|------|--------|--------|----------|--------------|-------------|");
    for row in rows {
        let last_success = row
            .last_success_at
            .map_or_else(|| "never".to_string(), |t| t.to_rfc3339());
        let avg = row
            .average_runtime_seconds
            .map_or_else(|| "\u{2014}".to_string(), |a| format!("{a:.1}s"));
        println!(
            "| {} | {} | {} | {} | {} | {} |",
            row.task_name,
            row.data_source,
            row.status,
            row.consecutive_failures,
            last_success,
            avg
        );
    }
    Ok(())
}

/// `yjtrack runs` — print recent run records, newest first.
///
/// # Errors
///
/// Returns an error if both storage backends fail the read.
pub async fn runs(config: &AppConfig, limit: usize) -> anyhow::Result<()> {
    let gateway = build_gateway(config).await;
    let rows = gateway.list_runs(limit).await?;

    if rows.is_empty() {
        println!("no run records");
        return Ok(());
    }

    println!("| started | task | status | found | inserted | updated | error |");
    println!("|---------|------|--------|-------|----------|---------|-------|");
    for row in rows {
        let error = row.error_message.as_deref().unwrap_or("\u{2014}").replace('|', "\\|");
        println!(
            "| {} | {} | {} | {} | {} | {} | {} |",
            row.started_at.to_rfc3339(),
            row.task_name,
            row.status,
            row.records_found,
            row.records_inserted,
            row.records_updated,
            error
        );
    }
    Ok(())
}

/// `yjtrack alerts` — print alerts, open only unless `--all`.
///
/// # Errors
///
/// Returns an error if both storage backends fail the read.
pub async fn alerts(config: &AppConfig, include_resolved: bool) -> anyhow::Result<()> {
    let gateway = build_gateway(config).await;
    let rows = gateway.list_alerts(include_resolved, 100).await?;

    if rows.is_empty() {
        println!("no alerts");
        return Ok(());
    }

    println!("| raised | task | severity | resolved | message |");
    println!("|--------|------|----------|----------|---------|");
    for row in rows {
        println!(
            "| {} | {} | {} | {} | {} |",
            row.created_at.to_rfc3339(),
            row.task_name,
            row.severity,
            if row.is_resolved { "yes" } else { "no" },
            row.message.replace('|', "\\|")
        );
    }
    Ok(())
}

/// `yjtrack db migrate` — apply pending migrations to the primary store.
///
/// # Errors
///
/// Returns an error when `DATABASE_URL` is unset, unreachable, or a
/// migration fails.
pub async fn migrate(config: &AppConfig) -> anyhow::Result<()> {
    let url = config
        .database_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set to run migrations"))?;

    let pool = yjtrack_store::connect_pool(
        url,
        PoolConfig {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        },
    )
    .await?;

    yjtrack_store::run_migrations(&pool).await?;
    println!("migrations applied");
    Ok(())
}
