//! The pluggable collection capability.

use async_trait::async_trait;

use yjtrack_core::records::Dataset;
use yjtrack_core::tasks::CollectionTask;

use crate::error::CollectError;

/// One source's fetch-and-extract implementation.
///
/// Implementations must be idempotent — re-running against the same source
/// state produces equivalent records — and side-effect-free beyond the
/// fetch itself. The task runner supplies retries, rate limiting, caching,
/// validation, and persistence; a collector only turns a task configuration
/// into records.
#[async_trait]
pub trait Collector: Send + Sync {
    async fn collect(&self, task: &CollectionTask) -> Result<Dataset, CollectError>;
}
