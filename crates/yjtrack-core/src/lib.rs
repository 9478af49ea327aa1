pub mod app_config;
mod config;
pub mod records;
pub mod tasks;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use records::{BudgetAllocation, Dataset, ParliamentaryDocument, YouthStatistic};
pub use tasks::{load_tasks, CollectionTask, RateLimitConfig, SourceKind, TasksFile};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read task file {path}: {source}")]
    TasksFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse task file: {0}")]
    TasksFileParse(#[from] serde_yaml::Error),

    #[error("{0}")]
    Validation(String),
}
