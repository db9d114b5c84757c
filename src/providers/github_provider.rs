use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use tracing::{debug, info};

use super::base::{CommitFetcher, FetchError};
use crate::models::{CommitListEntry, CommitObservation, RepositoryTarget, SHORT_SHA_LEN};

/// Settings for the GitHub REST commit lookup.
#[derive(Debug, Clone)]
pub struct GithubFetcherConfig {
    /// Base URL of the REST API, e.g. `https://api.github.com`.
    pub api_url: String,
    /// Sent as `Authorization: token <access_token>`; omitted when empty.
    pub access_token: String,
    pub request_timeout: Duration,
}

/// Fetches the newest commit through `GET /repos/{owner}/{name}/commits`.
pub struct GithubFetcher {
    config: GithubFetcherConfig,
    client: reqwest::Client,
}

impl GithubFetcher {
    pub fn new(config: GithubFetcherConfig) -> Result<Self, reqwest::Error> {
        info!(
            "Creating GitHub commit fetcher for '{}' (timeout {:?})",
            config.api_url, config.request_timeout
        );
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;
        Ok(Self { config, client })
    }

    fn commits_url(&self, target: &RepositoryTarget) -> String {
        format!(
            "{}/repos/{}/{}/commits",
            self.config.api_url.trim_end_matches('/'),
            target.owner,
            target.name
        )
    }
}

#[async_trait::async_trait]
impl CommitFetcher for GithubFetcher {
    fn get_name(&self) -> &str {
        "github"
    }

    async fn fetch(&self, target: &RepositoryTarget) -> Result<CommitObservation, FetchError> {
        let url = self.commits_url(target);
        debug!("Sending commit list request to: {}", url);

        let mut request = self
            .client
            .get(&url)
            .query(&[("per_page", "1")])
            .header(ACCEPT, "application/vnd.github+json");
        if !self.config.access_token.is_empty() {
            request = request.header(
                AUTHORIZATION,
                format!("token {}", self.config.access_token),
            );
        }

        let response = request.send().await.map_err(FetchError::Transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body = response.bytes().await.map_err(FetchError::Transport)?;
        parse_commit_list(&body)
    }
}

/// Extracts the newest commit from a commit list response body.
/// The list is ordered newest-first, so only the first element is read.
pub fn parse_commit_list(body: &[u8]) -> Result<CommitObservation, FetchError> {
    let entries: Vec<CommitListEntry> = serde_json::from_slice(body).map_err(FetchError::Decode)?;
    let newest = entries.into_iter().next().ok_or(FetchError::NoCommits)?;

    let date = newest
        .committer_date()
        .ok_or(FetchError::MissingField("commit.committer.date"))?;
    let committed_at = DateTime::parse_from_rfc3339(date)
        .map_err(|source| FetchError::InvalidDate {
            value: date.to_string(),
            source,
        })?
        .with_timezone(&Utc);

    let sha = newest.sha.ok_or(FetchError::MissingField("sha"))?;
    if sha.len() < SHORT_SHA_LEN || !sha.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(FetchError::InvalidSha(sha));
    }

    Ok(CommitObservation { committed_at, sha })
}
