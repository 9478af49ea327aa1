pub mod health;
pub mod orchestrator;
pub mod runner;
pub mod validate;

pub use health::{HealthRecorder, HealthState};
pub use orchestrator::{EngineError, Orchestrator, RunSummary};
pub use runner::{RunnerConfig, TaskReport, TaskRunner, TaskStatus};
pub use validate::{validate_dataset, Severity, ValidationOutcome, Violation};
