//! Built-in collectors for the configured source kinds.
//!
//! Each collector owns its own `SourceClient`, so the rate limit and cache
//! TTL of one task never bleed into another. Extraction here is
//! intentionally thin — pull the obvious rows out of the page and let the
//! validator judge them.

mod budget;
mod detention;
mod qon;

use std::collections::HashMap;
use std::sync::Arc;

use yjtrack_collect::{Collector, SourceClient};
use yjtrack_core::tasks::{CollectionTask, SourceKind};
use yjtrack_core::AppConfig;

pub use budget::BudgetPapersCollector;
pub use detention::DetentionCensusCollector;
pub use qon::QuestionsOnNoticeCollector;

/// Builds one collector per task, keyed by task name.
///
/// # Errors
///
/// Returns an error if an HTTP client cannot be constructed for a task.
pub fn build_collectors(
    config: &AppConfig,
    tasks: &[CollectionTask],
) -> anyhow::Result<HashMap<String, Arc<dyn Collector>>> {
    let mut collectors: HashMap<String, Arc<dyn Collector>> = HashMap::new();

    for task in tasks {
        let client = SourceClient::new(
            task.attempt_timeout_secs,
            &config.fetch_user_agent,
            &task.rate_limit,
            task.cache_ttl(),
        )?;

        let collector: Arc<dyn Collector> = match task.kind {
            SourceKind::DetentionCensus => Arc::new(DetentionCensusCollector::new(client)),
            SourceKind::BudgetPapers => Arc::new(BudgetPapersCollector::new(client)),
            SourceKind::QuestionsOnNotice => Arc::new(QuestionsOnNoticeCollector::new(client)),
        };
        collectors.insert(task.name.clone(), collector);
    }

    Ok(collectors)
}
