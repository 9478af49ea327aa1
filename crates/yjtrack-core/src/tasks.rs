//! Collection task roster, loaded from `config/tasks.yaml`.
//!
//! Each entry describes one recurring collection job: which source to hit,
//! how often it is expected to produce data, and the retry/rate-limit
//! parameters its runner must obey. The roster is immutable after startup.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Which built-in collector implementation a task uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    DetentionCensus,
    BudgetPapers,
    QuestionsOnNotice,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::DetentionCensus => write!(f, "detention_census"),
            SourceKind::BudgetPapers => write!(f, "budget_papers"),
            SourceKind::QuestionsOnNotice => write!(f, "questions_on_notice"),
        }
    }
}

/// Minimum spacing of outbound requests: at most `max_requests` per
/// `period_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub period_secs: u64,
}

impl RateLimitConfig {
    /// The minimum interval between two requests under this limit.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.period_secs) / self.max_requests.max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionTask {
    /// Unique task name, e.g. `"detention-census"`.
    pub name: String,
    /// Data source label recorded on every run, e.g. `"qld_youth_justice"`.
    pub data_source: String,
    pub kind: SourceKind,
    /// Page or endpoint the collector starts from.
    pub url: String,
    /// Schedule hint: how often the source is expected to publish.
    pub expected_cadence_hours: u32,
    /// Hard ceiling on a single collection attempt.
    pub attempt_timeout_secs: u64,
    /// Total attempts, first try included.
    pub max_attempts: u32,
    pub rate_limit: RateLimitConfig,
    /// How long a fetched response may be served from cache.
    pub cache_ttl_secs: u64,
}

impl CollectionTask {
    #[must_use]
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[derive(Debug, Deserialize)]
pub struct TasksFile {
    pub tasks: Vec<CollectionTask>,
}

/// Load and validate the task roster from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_tasks(path: &Path) -> Result<TasksFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::TasksFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let tasks_file: TasksFile = serde_yaml::from_str(&content)?;

    validate_tasks(&tasks_file)?;

    Ok(tasks_file)
}

fn validate_tasks(tasks_file: &TasksFile) -> Result<(), ConfigError> {
    if tasks_file.tasks.is_empty() {
        return Err(ConfigError::Validation(
            "task file contains no tasks".to_string(),
        ));
    }

    let mut seen_names = HashSet::new();

    for task in &tasks_file.tasks {
        if task.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "task name must be non-empty".to_string(),
            ));
        }

        if !seen_names.insert(task.name.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate task name: '{}'",
                task.name
            )));
        }

        if task.url.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "task '{}' has an empty url",
                task.name
            )));
        }

        if task.max_attempts == 0 {
            return Err(ConfigError::Validation(format!(
                "task '{}' must allow at least one attempt",
                task.name
            )));
        }

        if task.attempt_timeout_secs == 0 {
            return Err(ConfigError::Validation(format!(
                "task '{}' has a zero attempt timeout",
                task.name
            )));
        }

        if task.expected_cadence_hours == 0 {
            return Err(ConfigError::Validation(format!(
                "task '{}' has a zero expected cadence",
                task.name
            )));
        }

        if task.rate_limit.max_requests == 0 || task.rate_limit.period_secs == 0 {
            return Err(ConfigError::Validation(format!(
                "task '{}' has an invalid rate limit (max_requests and period_secs must be positive)",
                task.name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(name: &str) -> CollectionTask {
        CollectionTask {
            name: name.to_string(),
            data_source: "qld_youth_justice".to_string(),
            kind: SourceKind::DetentionCensus,
            url: "https://www.example.gov.au/census".to_string(),
            expected_cadence_hours: 24,
            attempt_timeout_secs: 30,
            max_attempts: 3,
            rate_limit: RateLimitConfig {
                max_requests: 10,
                period_secs: 60,
            },
            cache_ttl_secs: 300,
        }
    }

    #[test]
    fn rate_limit_interval() {
        let limit = RateLimitConfig {
            max_requests: 10,
            period_secs: 60,
        };
        assert_eq!(limit.interval(), Duration::from_secs(6));
    }

    #[test]
    fn rate_limit_interval_guards_zero_requests() {
        let limit = RateLimitConfig {
            max_requests: 0,
            period_secs: 60,
        };
        assert_eq!(limit.interval(), Duration::from_secs(60));
    }

    #[test]
    fn validate_accepts_well_formed_roster() {
        let file = TasksFile {
            tasks: vec![task("detention-census"), task("budget-papers")],
        };
        assert!(validate_tasks(&file).is_ok());
    }

    #[test]
    fn validate_rejects_empty_roster() {
        let file = TasksFile { tasks: vec![] };
        assert!(matches!(
            validate_tasks(&file),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn validate_rejects_duplicate_names_case_insensitively() {
        let file = TasksFile {
            tasks: vec![task("census"), task("Census")],
        };
        let err = validate_tasks(&file).unwrap_err();
        assert!(err.to_string().contains("duplicate task name"));
    }

    #[test]
    fn validate_rejects_zero_attempts() {
        let mut bad = task("census");
        bad.max_attempts = 0;
        let file = TasksFile { tasks: vec![bad] };
        let err = validate_tasks(&file).unwrap_err();
        assert!(err.to_string().contains("at least one attempt"));
    }

    #[test]
    fn validate_rejects_zero_rate_limit_period() {
        let mut bad = task("census");
        bad.rate_limit.period_secs = 0;
        let file = TasksFile { tasks: vec![bad] };
        assert!(validate_tasks(&file).is_err());
    }

    #[test]
    fn parses_yaml_roster() {
        let yaml = r"
tasks:
  - name: detention-census
    data_source: qld_youth_justice
    kind: detention_census
    url: https://www.example.gov.au/census
    expected_cadence_hours: 24
    attempt_timeout_secs: 30
    max_attempts: 3
    rate_limit:
      max_requests: 10
      period_secs: 60
    cache_ttl_secs: 300
";
        let file: TasksFile = serde_yaml::from_str(yaml).expect("roster should parse");
        assert_eq!(file.tasks.len(), 1);
        assert_eq!(file.tasks[0].kind, SourceKind::DetentionCensus);
        assert!(validate_tasks(&file).is_ok());
    }
}
