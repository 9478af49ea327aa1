use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    /// Primary store connection string. `None` means the process starts
    /// directly on the fallback store.
    pub database_url: Option<String>,
    pub env: Environment,
    pub log_level: String,
    pub tasks_path: PathBuf,
    pub fallback_path: PathBuf,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub fetch_user_agent: String,
    pub max_concurrent_tasks: usize,
    pub inter_batch_delay_secs: u64,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub retry_max_jitter_ms: u64,
    pub alert_failure_threshold: u32,
    pub schedule_cron: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_url", &self.database_url.as_ref().map(|_| "[redacted]"))
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("tasks_path", &self.tasks_path)
            .field("fallback_path", &self.fallback_path)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("fetch_user_agent", &self.fetch_user_agent)
            .field("max_concurrent_tasks", &self.max_concurrent_tasks)
            .field("inter_batch_delay_secs", &self.inter_batch_delay_secs)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .field("retry_max_delay_ms", &self.retry_max_delay_ms)
            .field("retry_max_jitter_ms", &self.retry_max_jitter_ms)
            .field("alert_failure_threshold", &self.alert_failure_threshold)
            .field("schedule_cron", &self.schedule_cron)
            .finish()
    }
}
