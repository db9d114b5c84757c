//! Periodic commit age collection.
//!
//! One cycle walks every configured repository in order, fetches its newest
//! commit and writes the commit age into the metrics store. A failing
//! repository is logged and skipped; its previously exposed value is kept.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::metrics::MetricsRecorder;
use crate::models::RepositoryTarget;
use crate::providers::CommitFetcher;
use crate::utils::LogThrottle;

const FAILURE_LOG_WINDOW: Duration = Duration::from_secs(300);

/// Outcome counts of a single collection cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Repositories whose commit age was written.
    pub updated: usize,
    /// Repositories whose lookup failed.
    pub failed: usize,
    /// Malformed identifiers that were not looked up.
    pub skipped: usize,
}

/// Drives the fetch/write cycle for a fixed list of repositories.
pub struct Collector<R: MetricsRecorder> {
    fetcher: Arc<dyn CommitFetcher>,
    recorder: R,
    repositories: Vec<String>,
    interval: Duration,
    failure_logs: LogThrottle,
}

impl<R: MetricsRecorder> Collector<R> {
    pub fn new(
        fetcher: Arc<dyn CommitFetcher>,
        recorder: R,
        repositories: Vec<String>,
        interval: Duration,
    ) -> Self {
        Self {
            fetcher,
            recorder,
            repositories,
            interval,
            failure_logs: LogThrottle::new(FAILURE_LOG_WINDOW),
        }
    }

    /// Runs one pass over all repositories.
    pub async fn run_cycle(&self) -> CycleReport {
        let started = Instant::now();
        let mut report = CycleReport::default();

        for identifier in &self.repositories {
            let target = match RepositoryTarget::parse(identifier) {
                Ok(target) => target,
                Err(e) => {
                    report.skipped += 1;
                    self.recorder
                        .record_fetch_failure(identifier, "invalid_repository");
                    let log_key = failure_log_key(identifier, "invalid_repository");
                    if let Some(suppressed_count) = self.failure_logs.should_emit(&log_key) {
                        warn!(
                            event_name = "collector.repository.invalid",
                            repository = identifier.as_str(),
                            suppressed_count,
                            "Invalid repository: {}",
                            e
                        );
                    }
                    continue;
                }
            };

            match self.fetcher.fetch(&target).await {
                Ok(observation) => {
                    let age_seconds = observation.age_seconds_at(Utc::now());
                    self.recorder
                        .set_commit_age(identifier, observation.short_sha(), age_seconds);
                    self.failure_logs
                        .reset_prefix(&failure_log_key(identifier, ""));
                    report.updated += 1;
                    debug!(
                        event_name = "collector.commit.updated",
                        repository = identifier.as_str(),
                        age_seconds,
                        commit_sha = observation.short_sha(),
                        "Metrics"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    self.recorder.record_fetch_failure(identifier, e.reason());
                    let log_key = failure_log_key(identifier, e.reason());
                    if let Some(suppressed_count) = self.failure_logs.should_emit(&log_key) {
                        warn!(
                            event_name = "collector.fetch.failed",
                            repository = identifier.as_str(),
                            fetcher = self.fetcher.get_name(),
                            reason = e.reason(),
                            suppressed_count,
                            "Failed to fetch recent commit info for repository {}: {}",
                            identifier,
                            e
                        );
                    }
                }
            }
        }

        self.recorder.record_cycle(started.elapsed().as_secs_f64());
        report
    }

    /// Runs cycles separated by the configured interval until `shutdown` fires
    /// or its sender is dropped. An in-flight cycle is abandoned on shutdown;
    /// writes already made stay visible.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            repositories = self.repositories.len(),
            interval_ms = self.interval.as_millis() as u64,
            "Collector started"
        );

        loop {
            tokio::select! {
                report = self.run_cycle() => {
                    debug!(
                        updated = report.updated,
                        failed = report.failed,
                        skipped = report.skipped,
                        "Collection cycle finished"
                    );
                }
                _ = shutdown.recv() => break,
            }

            tokio::select! {
                _ = sleep(self.interval) => {}
                _ = shutdown.recv() => break,
            }
        }

        info!("Collector stopped");
    }
}

/// Failure logs are throttled per repository and failure kind, so a change of
/// cause is always logged.
fn failure_log_key(repository: &str, reason: &str) -> String {
    format!("{}:{}", repository, reason)
}
