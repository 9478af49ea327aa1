//! End-to-end engine tests over the fallback storage backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use yjtrack_collect::{CollectError, Collector};
use yjtrack_core::records::{Dataset, YouthStatistic};
use yjtrack_core::tasks::{CollectionTask, RateLimitConfig, SourceKind};
use yjtrack_engine::{EngineError, Orchestrator, RunnerConfig, TaskRunner, TaskStatus};
use yjtrack_store::{FileStore, StorageGateway};

fn gateway(name: &str) -> Arc<StorageGateway> {
    let path = std::env::temp_dir().join(format!(
        "yjtrack-engine-{name}-{}.json",
        std::process::id()
    ));
    let _ = std::fs::remove_file(&path);
    Arc::new(StorageGateway::new(None, FileStore::new(path)))
}

fn task(name: &str) -> CollectionTask {
    CollectionTask {
        name: name.to_string(),
        data_source: "qld_youth_justice".to_string(),
        kind: SourceKind::DetentionCensus,
        url: "https://www.example.gov.au/census".to_string(),
        expected_cadence_hours: 24,
        attempt_timeout_secs: 5,
        max_attempts: 3,
        rate_limit: RateLimitConfig {
            max_requests: 1000,
            period_secs: 1,
        },
        cache_ttl_secs: 0,
    }
}

fn runner_config() -> RunnerConfig {
    RunnerConfig {
        retry_base_delay: Duration::ZERO,
        retry_max_delay: Duration::from_secs(1),
        retry_max_jitter: Duration::ZERO,
        alert_failure_threshold: 3,
    }
}

fn statistic(total_youth: i32) -> YouthStatistic {
    YouthStatistic {
        date: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
        facility_name: "Cleveland Youth Detention Centre".to_string(),
        program_type: "detention".to_string(),
        total_youth,
        indigenous_youth: Some(70),
        indigenous_percentage: Some(72.9),
        average_age: Some(15.4),
        average_stay_days: None,
        source_url: "https://www.example.gov.au/census".to_string(),
        collected_at: Utc::now(),
    }
}

/// Returns a fixed dataset on every call.
struct StaticCollector {
    records: Vec<YouthStatistic>,
}

#[async_trait]
impl Collector for StaticCollector {
    async fn collect(&self, _task: &CollectionTask) -> Result<Dataset, CollectError> {
        Ok(Dataset::YouthStatistics(self.records.clone()))
    }
}

/// Fails the first `fail_first` calls, then succeeds; counts every call.
struct FlakyCollector {
    fail_first: u32,
    calls: Arc<AtomicU32>,
    records: Vec<YouthStatistic>,
}

#[async_trait]
impl Collector for FlakyCollector {
    async fn collect(&self, _task: &CollectionTask) -> Result<Dataset, CollectError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_first {
            Err(CollectError::SourceUnavailable {
                url: "https://www.example.gov.au/census".to_string(),
                status: 503,
            })
        } else {
            Ok(Dataset::YouthStatistics(self.records.clone()))
        }
    }
}

/// Tracks how many collections run at once.
struct GaugeCollector {
    current: Arc<AtomicI32>,
    peak: Arc<AtomicI32>,
}

#[async_trait]
impl Collector for GaugeCollector {
    async fn collect(&self, _task: &CollectionTask) -> Result<Dataset, CollectError> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(Dataset::YouthStatistics(vec![]))
    }
}

/// Blocks until released, to hold a run open.
struct BlockingCollector {
    release: Arc<tokio::sync::Notify>,
}

#[async_trait]
impl Collector for BlockingCollector {
    async fn collect(&self, _task: &CollectionTask) -> Result<Dataset, CollectError> {
        self.release.notified().await;
        Ok(Dataset::YouthStatistics(vec![]))
    }
}

fn runner_with(
    gateway: &Arc<StorageGateway>,
    collectors: Vec<(&str, Arc<dyn Collector>)>,
) -> TaskRunner {
    let map: HashMap<String, Arc<dyn Collector>> = collectors
        .into_iter()
        .map(|(name, collector)| (name.to_string(), collector))
        .collect();
    TaskRunner::new(Arc::clone(gateway), map, runner_config())
}

#[tokio::test]
async fn successful_run_persists_records_and_health() {
    let gateway = gateway("success");
    let runner = runner_with(
        &gateway,
        vec![(
            "census",
            Arc::new(StaticCollector {
                records: vec![statistic(96)],
            }),
        )],
    );

    let report = runner.run(&task("census")).await;
    assert_eq!(report.status, TaskStatus::Succeeded);
    assert_eq!(report.records_found, 1);
    assert_eq!(report.records_processed, 1);
    assert_eq!(report.records_inserted, 1);

    let runs = gateway.list_runs(10).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, "completed");
    assert_eq!(runs[0].records_inserted, 1);

    let health = gateway.get_health("census", "qld_youth_justice").await.unwrap().unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.consecutive_failures, 0);
    assert!(health.last_success_at.is_some());
    assert!(health.average_runtime_seconds.is_some());

    let stats = gateway.list_youth_statistics(10).await.unwrap();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].total_youth, 96);
}

#[tokio::test]
async fn exhausted_retries_make_exactly_max_attempts() {
    let gateway = gateway("exhaust");
    let calls = Arc::new(AtomicU32::new(0));
    let runner = runner_with(
        &gateway,
        vec![(
            "census",
            Arc::new(FlakyCollector {
                fail_first: u32::MAX,
                calls: Arc::clone(&calls),
                records: vec![],
            }),
        )],
    );

    let census_task = task("census");
    let report = runner.run(&census_task).await;

    assert_eq!(report.status, TaskStatus::Failed);
    assert_eq!(
        calls.load(Ordering::SeqCst),
        census_task.max_attempts,
        "max_attempts=3 means exactly 3 collector invocations"
    );
    let error = report.error.expect("failed report must carry an error");
    assert!(error.contains("3 attempts"), "error lost attempt count: {error}");

    let runs = gateway.list_runs(10).await.unwrap();
    assert_eq!(runs[0].status, "failed");

    let health = gateway.get_health("census", "qld_youth_justice").await.unwrap().unwrap();
    assert_eq!(health.status, "error");
    assert_eq!(health.consecutive_failures, 1);
}

#[tokio::test]
async fn consecutive_failures_reset_only_on_success() {
    let gateway = gateway("reset");
    let calls = Arc::new(AtomicU32::new(0));
    // Fails every attempt of the first two runs (3 attempts each), then
    // succeeds.
    let runner = runner_with(
        &gateway,
        vec![(
            "census",
            Arc::new(FlakyCollector {
                fail_first: 6,
                calls: Arc::clone(&calls),
                records: vec![statistic(96)],
            }),
        )],
    );
    let census_task = task("census");

    runner.run(&census_task).await;
    runner.run(&census_task).await;
    let health = gateway.get_health("census", "qld_youth_justice").await.unwrap().unwrap();
    assert_eq!(health.consecutive_failures, 2);

    let report = runner.run(&census_task).await;
    assert_eq!(report.status, TaskStatus::Succeeded);
    let health = gateway.get_health("census", "qld_youth_justice").await.unwrap().unwrap();
    assert_eq!(health.consecutive_failures, 0);
    assert_eq!(health.status, "healthy");
}

#[tokio::test]
async fn all_records_invalid_fails_the_run_with_validation_cause() {
    let gateway = gateway("invalid");
    let mut bad = statistic(96);
    bad.indigenous_percentage = Some(140.0);
    let runner = runner_with(
        &gateway,
        vec![("census", Arc::new(StaticCollector { records: vec![bad] }))],
    );

    let report = runner.run(&task("census")).await;
    assert_eq!(report.status, TaskStatus::Failed);
    assert_eq!(report.records_found, 1);
    assert_eq!(report.records_processed, 0);
    let error = report.error.unwrap();
    assert!(error.contains("validation"), "unexpected cause: {error}");

    let runs = gateway.list_runs(10).await.unwrap();
    assert_eq!(runs[0].status, "failed");
    assert_eq!(runs[0].records_found, 1);
    assert_eq!(runs[0].records_processed, 0);
}

#[tokio::test]
async fn empty_collection_is_a_successful_run() {
    let gateway = gateway("empty");
    let runner = runner_with(
        &gateway,
        vec![("census", Arc::new(StaticCollector { records: vec![] }))],
    );

    let report = runner.run(&task("census")).await;
    assert_eq!(report.status, TaskStatus::Succeeded);
    assert_eq!(report.records_found, 0);
}

#[tokio::test]
async fn summary_counts_always_cover_all_tasks() {
    let gateway = gateway("summary");
    let runner = runner_with(
        &gateway,
        vec![
            (
                "census",
                Arc::new(StaticCollector {
                    records: vec![statistic(96)],
                }) as Arc<dyn Collector>,
            ),
            (
                "budget",
                Arc::new(FlakyCollector {
                    fail_first: u32::MAX,
                    calls: Arc::new(AtomicU32::new(0)),
                    records: vec![],
                }),
            ),
            ("qon", Arc::new(StaticCollector { records: vec![] })),
        ],
    );
    let orchestrator = Orchestrator::new(runner, 2, Duration::ZERO);

    let mut budget = task("budget");
    budget.max_attempts = 1;
    let tasks = vec![task("census"), budget, task("qon")];
    let summary = orchestrator.run_all(&tasks).await.unwrap();

    assert_eq!(summary.total_tasks, 3);
    assert_eq!(summary.succeeded + summary.failed, summary.total_tasks);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.reports.len(), 3);
    // Reports come back in roster order regardless of completion order.
    assert_eq!(summary.reports[0].task_name, "census");
    assert_eq!(summary.reports[1].task_name, "budget");
}

#[tokio::test]
async fn failed_subset_is_retried_once_and_can_recover() {
    let gateway = gateway("retrypass");
    let calls = Arc::new(AtomicU32::new(0));
    let runner = runner_with(
        &gateway,
        vec![(
            "census",
            Arc::new(FlakyCollector {
                fail_first: 1,
                calls: Arc::clone(&calls),
                records: vec![statistic(96)],
            }),
        )],
    );
    let orchestrator = Orchestrator::new(runner, 2, Duration::ZERO);

    let mut census_task = task("census");
    census_task.max_attempts = 1;
    let summary = orchestrator.run_all(std::slice::from_ref(&census_task)).await.unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(
        calls.load(Ordering::SeqCst),
        2,
        "one failed pass plus one retry pass"
    );

    // Both the failed and the recovered run are in the ledger.
    let runs = gateway.list_runs(10).await.unwrap();
    assert_eq!(runs.len(), 2);
}

#[tokio::test]
async fn batches_respect_the_concurrency_bound() {
    let gateway = gateway("batches");
    let current = Arc::new(AtomicI32::new(0));
    let peak = Arc::new(AtomicI32::new(0));
    let collectors: Vec<(&str, Arc<dyn Collector>)> = ["a", "b", "c"]
        .iter()
        .map(|name| {
            (
                *name,
                Arc::new(GaugeCollector {
                    current: Arc::clone(&current),
                    peak: Arc::clone(&peak),
                }) as Arc<dyn Collector>,
            )
        })
        .collect();
    let runner = runner_with(&gateway, collectors);
    let delay = Duration::from_millis(100);
    let orchestrator = Orchestrator::new(runner, 2, delay);

    let tasks = vec![task("a"), task("b"), task("c")];
    let started = tokio::time::Instant::now();
    let summary = orchestrator.run_all(&tasks).await.unwrap();

    assert_eq!(summary.succeeded, 3);
    assert!(
        peak.load(Ordering::SeqCst) <= 2,
        "no more than max_concurrent tasks may run at once"
    );
    // Two batches ([2, 1]) means the inter-batch delay elapsed once.
    assert!(started.elapsed() >= delay);
}

#[tokio::test]
async fn second_concurrent_run_all_is_rejected() {
    let gateway = gateway("singleflight");
    let release = Arc::new(tokio::sync::Notify::new());
    let runner = runner_with(
        &gateway,
        vec![(
            "census",
            Arc::new(BlockingCollector {
                release: Arc::clone(&release),
            }),
        )],
    );
    let orchestrator = Arc::new(Orchestrator::new(runner, 1, Duration::ZERO));

    let background = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.run_all(&[task("census")]).await })
    };
    // Let the first invocation take the single-flight guard.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let second = orchestrator.run_all(&[task("census")]).await;
    assert!(matches!(second, Err(EngineError::AlreadyRunning)));

    release.notify_waiters();
    let first = background.await.unwrap().unwrap();
    assert_eq!(first.succeeded, 1);
}

#[tokio::test]
async fn same_natural_key_from_two_tasks_is_last_write_wins() {
    let gateway = gateway("lastwrite");
    let runner = runner_with(
        &gateway,
        vec![
            (
                "census-a",
                Arc::new(StaticCollector {
                    records: vec![statistic(90)],
                }) as Arc<dyn Collector>,
            ),
            (
                "census-b",
                Arc::new(StaticCollector {
                    records: vec![statistic(96)],
                }),
            ),
        ],
    );
    let orchestrator = Orchestrator::new(runner, 2, Duration::ZERO);

    let summary = orchestrator
        .run_all(&[task("census-a"), task("census-b")])
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 2, "conflicting writers must not error");
    let stats = gateway.list_youth_statistics(10).await.unwrap();
    assert_eq!(stats.len(), 1, "one record per natural key");
    assert!(
        stats[0].total_youth == 90 || stats[0].total_youth == 96,
        "stored record must be one of the two writes"
    );
}

#[tokio::test]
async fn threshold_failures_raise_an_alert_and_success_resolves_it() {
    let gateway = gateway("alerting");
    let calls = Arc::new(AtomicU32::new(0));
    let runner = runner_with(
        &gateway,
        vec![(
            "census",
            Arc::new(FlakyCollector {
                fail_first: 3,
                calls: Arc::clone(&calls),
                records: vec![statistic(96)],
            }),
        )],
    );
    let mut census_task = task("census");
    census_task.max_attempts = 1;

    for _ in 0..3 {
        runner.run(&census_task).await;
    }
    let open = gateway.list_alerts(false, 10).await.unwrap();
    assert_eq!(open.len(), 1, "third consecutive failure must alert");
    assert_eq!(open[0].severity, "warning");

    let report = runner.run(&census_task).await;
    assert_eq!(report.status, TaskStatus::Succeeded);
    let open = gateway.list_alerts(false, 10).await.unwrap();
    assert!(open.is_empty(), "success must resolve open alerts");
}
