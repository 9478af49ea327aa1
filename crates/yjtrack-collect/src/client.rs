//! HTTP client for government source pages.
//!
//! Wraps `reqwest` with the per-task politeness machinery: every network
//! fetch passes the rate-limiter gate, and responses are served from the
//! short-TTL cache when a run touches the same page twice. Cache hits skip
//! the gate — no request goes out.

use std::time::Duration;

use reqwest::Client;

use yjtrack_core::tasks::RateLimitConfig;

use crate::cache::{request_signature, ResponseCache};
use crate::error::CollectError;
use crate::rate_limit::RateLimiter;

pub struct SourceClient {
    client: Client,
    limiter: RateLimiter,
    cache: ResponseCache,
    cache_ttl: Duration,
}

impl SourceClient {
    /// Creates a client with configured timeout, `User-Agent`, rate limit,
    /// and response-cache TTL.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed (e.g., invalid TLS config).
    pub fn new(
        timeout_secs: u64,
        user_agent: &str,
        rate_limit: &RateLimitConfig,
        cache_ttl: Duration,
    ) -> Result<Self, CollectError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            limiter: RateLimiter::new(
                rate_limit.max_requests,
                Duration::from_secs(rate_limit.period_secs),
            ),
            cache: ResponseCache::new(),
            cache_ttl,
        })
    }

    /// Fetches a page as text, serving from cache when fresh.
    ///
    /// # Errors
    ///
    /// - [`CollectError::SourceUnavailable`] — HTTP 404 or 410; the page
    ///   moved or was withdrawn.
    /// - [`CollectError::UnexpectedStatus`] — any other non-2xx status.
    /// - [`CollectError::Http`] — network or TLS failure.
    pub async fn get_text(&self, url: &str) -> Result<String, CollectError> {
        let signature = request_signature("GET", url);
        self.cache
            .fetch_cached(&signature, self.cache_ttl, || self.fetch_text(url))
            .await
    }

    async fn fetch_text(&self, url: &str) -> Result<String, CollectError> {
        self.limiter.acquire().await;

        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
            return Err(CollectError::SourceUnavailable {
                url: url.to_owned(),
                status: status.as_u16(),
            });
        }

        if !status.is_success() {
            return Err(CollectError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_owned(),
            });
        }

        Ok(response.text().await?)
    }
}
