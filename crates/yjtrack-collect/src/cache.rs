//! Short-TTL response cache keyed by request signature.
//!
//! Avoids refetching the same document when several tasks in one run read
//! from the same page. Entries never outlive their TTL; errors are not
//! cached. Two concurrent misses for the same key both fetch — there is no
//! request coalescing.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::CollectError;

struct CacheEntry {
    stored_at: Instant,
    body: String,
}

#[derive(Default)]
pub struct ResponseCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

/// Cache key for a request: hex SHA-256 over method and URL.
#[must_use]
pub fn request_signature(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b" ");
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl ResponseCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached body when its age is under `ttl`, otherwise runs
    /// `fetch`, stores the result, and returns it.
    ///
    /// # Errors
    ///
    /// Propagates the error from `fetch`; nothing is stored on failure.
    pub async fn fetch_cached<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        fetch: F,
    ) -> Result<String, CollectError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, CollectError>>,
    {
        {
            let entries = self.entries.lock().await;
            if let Some(entry) = entries.get(key) {
                if entry.stored_at.elapsed() < ttl {
                    tracing::debug!(key, "serving response from cache");
                    return Ok(entry.body.clone());
                }
            }
        }

        let body = fetch().await?;

        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            CacheEntry {
                stored_at: Instant::now(),
                body: body.clone(),
            },
        );
        Ok(body)
    }
}
