use reqwest::StatusCode;
use thiserror::Error;

use crate::models::{CommitObservation, RepositoryTarget};

/// Every way a single commit lookup can fail. None of them are fatal:
/// the collector skips the repository until the next cycle.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("unexpected status code: {0}")]
    Status(StatusCode),
    #[error("failed to decode response body: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("no commits found")]
    NoCommits,
    #[error("response is missing field '{0}'")]
    MissingField(&'static str),
    #[error("failed to parse commit date '{value}': {source}")]
    InvalidDate {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    #[error("commit hash '{0}' is not a hexadecimal string of at least 8 characters")]
    InvalidSha(String),
}

impl FetchError {
    /// Stable identifier used as the `reason` label of the failure counter.
    pub fn reason(&self) -> &'static str {
        match self {
            FetchError::Transport(e) if e.is_timeout() => "timeout",
            FetchError::Transport(_) => "transport",
            FetchError::Status(_) => "status",
            FetchError::Decode(_) => "decode",
            FetchError::NoCommits => "no_commits",
            FetchError::MissingField(_) => "missing_field",
            FetchError::InvalidDate { .. } => "invalid_date",
            FetchError::InvalidSha(_) => "invalid_sha",
        }
    }
}

/// Looks up the newest commit of a repository.
#[async_trait::async_trait]
pub trait CommitFetcher: Send + Sync {
    fn get_name(&self) -> &str;
    async fn fetch(&self, target: &RepositoryTarget) -> Result<CommitObservation, FetchError>;
}
