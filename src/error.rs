use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Errors raised inside the analysis pipeline.
///
/// Per-candidate failures are caught and recorded in the candidate outcome
/// list; only session-level failures (page cannot open, listing unreachable)
/// reach the caller of `analyze_listing`.
#[derive(Error, Debug)]
pub enum ScrapeError {
    /// Listing unreachable or removed (404/410, DNS, refused connection)
    #[error("listing not found: {0}")]
    NotFound(String),

    /// A navigation or download exceeded its timeout
    #[error("navigation timed out after {0:?}")]
    NavigationTimeout(Duration),

    /// Corrupt or empty binary document
    #[error("document decode failed: {0}")]
    Decode(String),

    /// A processor ran but found nothing extractable
    #[error("no qualifying content: {0}")]
    NoQualifyingContent(String),

    /// Discovery produced zero document candidates
    #[error("no document candidates found")]
    NoCandidatesFound,

    /// Narrative summarizer unavailable or unusable
    #[error("summarizer unavailable: {0}")]
    DownstreamService(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScrapeError {
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn no_content(msg: impl Into<String>) -> Self {
        Self::NoQualifyingContent(msg.into())
    }
}
