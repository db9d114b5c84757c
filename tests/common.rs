#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use chrono::Utc;
use commit_age_exporter::config::ConfigV1;
use commit_age_exporter::metrics::Metrics;
use commit_age_exporter::models::{CommitObservation, RepositoryTarget};
use commit_age_exporter::providers::{CommitFetcher, FetchError};
use commit_age_exporter::routes::create_router;
use commit_age_exporter::state::AppState;
use figment::{
    Figment,
    providers::{Format, Yaml},
};
use http_body_util::BodyExt;
use tower::ServiceExt;

/// One scripted answer: a commit of the given age and hash, or a failure.
#[derive(Clone, Debug)]
pub enum Answer {
    Commit { age_secs: i64, sha: &'static str },
    Fail,
}

/// Fetcher that replays scripted answers per repository. The last answer
/// of a repository repeats once its script is exhausted.
#[derive(Default)]
pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, VecDeque<Answer>>>,
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new(scripts: &[(&str, Vec<Answer>)]) -> Self {
        Self {
            scripts: Mutex::new(
                scripts
                    .iter()
                    .map(|(repo, answers)| (repo.to_string(), answers.iter().cloned().collect()))
                    .collect(),
            ),
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl CommitFetcher for ScriptedFetcher {
    fn get_name(&self) -> &str {
        "scripted"
    }

    async fn fetch(&self, target: &RepositoryTarget) -> Result<CommitObservation, FetchError> {
        let key = target.to_string();
        self.calls.lock().unwrap().push(key.clone());

        let mut scripts = self.scripts.lock().unwrap();
        let answer = match scripts.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };

        match answer {
            Some(Answer::Commit { age_secs, sha }) => Ok(CommitObservation {
                committed_at: Utc::now() - chrono::Duration::seconds(age_secs),
                sha: sha.to_string(),
            }),
            Some(Answer::Fail) | None => Err(FetchError::Status(StatusCode::BAD_GATEWAY)),
        }
    }
}

pub fn load_test_config(yaml: &str) -> ConfigV1 {
    ConfigV1::from_figment(Figment::new().merge(Yaml::string(yaml)))
        .expect("Failed to parse test config YAML")
}

pub fn build_app(config: ConfigV1, metrics: Metrics) -> Router {
    let state = AppState {
        config: Arc::new(config),
        metrics,
    };
    create_router(state)
}

/// Issues a GET against the router and returns status and body text.
pub async fn get(app: &Router, path: &str) -> (StatusCode, Option<String>, String) {
    let request = Request::builder()
        .method(Method::GET)
        .uri(path)
        .body(Body::empty())
        .expect("failed to build request");

    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("request should complete");

    let status = response.status();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let body = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();

    (
        status,
        content_type,
        String::from_utf8(body.to_vec()).expect("body should be UTF-8"),
    )
}

/// Commit age sample lines of a text exposition.
pub fn commit_age_lines(text: &str) -> Vec<&str> {
    text.lines()
        .filter(|line| line.starts_with("github_last_commit_age_seconds{"))
        .collect()
}

/// Parses the value of a sample line.
pub fn sample_value(line: &str) -> f64 {
    line.rsplit(' ')
        .next()
        .and_then(|value| value.parse().ok())
        .expect("sample line should end with a number")
}

pub const SHORT_INTERVAL: Duration = Duration::from_millis(50);
