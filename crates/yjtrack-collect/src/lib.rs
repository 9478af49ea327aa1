pub mod cache;
pub mod client;
pub mod collector;
pub mod error;
pub mod rate_limit;
pub mod retry;

pub use cache::ResponseCache;
pub use client::SourceClient;
pub use collector::Collector;
pub use error::CollectError;
pub use rate_limit::RateLimiter;
pub use retry::RetryPolicy;
