use thiserror::Error;

/// Failure taxonomy for the crawl pipeline. The retry driver in `crawler`
/// matches on these kinds: only a deadline expiry is worth another attempt,
/// everything else aborts the event.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("fetch deadline expired")]
    FetchTimeout,

    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("page structure mismatch: {what}")]
    StructureMismatch { what: String },

    #[error("no identity found for {name}")]
    IdentityUnresolved { name: String },

    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl CrawlError {
    pub fn structure(what: impl Into<String>) -> Self {
        CrawlError::StructureMismatch { what: what.into() }
    }

    pub fn unresolved(name: impl Into<String>) -> Self {
        CrawlError::IdentityUnresolved { name: name.into() }
    }

    /// A timeout means the source was slow, not that the page changed shape.
    /// Retrying a structure mismatch cannot succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CrawlError::FetchTimeout)
    }
}
