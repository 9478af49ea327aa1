use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("source unavailable: {url} returned {status}")]
    SourceUnavailable { url: String, status: u16 },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("attempt timed out after {secs}s")]
    AttemptTimeout { secs: u64 },

    #[error("extraction failed for {context}: {reason}")]
    Extraction { context: String, reason: String },

    #[error("all {attempts} attempts failed; last error: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}
