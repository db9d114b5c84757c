use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Number of hash characters used for the `commit_sha` label.
pub const SHORT_SHA_LEN: usize = 8;

/// The newest commit of a repository, as returned by one fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitObservation {
    pub committed_at: DateTime<Utc>,
    /// Full hexadecimal hash, at least [`SHORT_SHA_LEN`] characters long.
    pub sha: String,
}

impl CommitObservation {
    pub fn short_sha(&self) -> &str {
        // Hashes are validated as ASCII hex, so byte slicing is safe.
        &self.sha[..SHORT_SHA_LEN.min(self.sha.len())]
    }

    /// Seconds between the commit and `now`. Negative if the commit date lies in the future.
    pub fn age_seconds_at(&self, now: DateTime<Utc>) -> f64 {
        (now - self.committed_at).num_milliseconds() as f64 / 1000.0
    }
}

/// One element of the `GET /repos/{owner}/{name}/commits` response.
///
/// Every field is optional so that missing data surfaces as a typed error
/// instead of a decode failure.
#[derive(Debug, Deserialize)]
pub struct CommitListEntry {
    pub sha: Option<String>,
    pub commit: Option<CommitDetail>,
}

#[derive(Debug, Deserialize)]
pub struct CommitDetail {
    pub committer: Option<CommitSignature>,
}

#[derive(Debug, Deserialize)]
pub struct CommitSignature {
    pub date: Option<String>,
}

impl CommitListEntry {
    pub fn committer_date(&self) -> Option<&str> {
        self.commit
            .as_ref()
            .and_then(|commit| commit.committer.as_ref())
            .and_then(|committer| committer.date.as_deref())
    }
}
