//! Metrics recording implementation using Prometheus.

use prometheus::{
    CounterVec, Encoder, GaugeVec, Histogram, IntCounter, Opts, Registry, TextEncoder,
    register_counter_vec_with_registry, register_gauge_vec_with_registry,
    register_histogram_with_registry, register_int_counter_with_registry,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Name of the gauge family exposing commit ages.
pub const COMMIT_AGE_METRIC: &str = "github_last_commit_age_seconds";
const FETCH_FAILURES_METRIC: &str = "github_commit_fetch_failures_total";

/// Trait for recording exporter metrics.
pub trait MetricsRecorder: Clone + Send + Sync + 'static {
    /// Stores the age of the newest commit of `repository`.
    fn set_commit_age(&self, repository: &str, commit_sha: &str, age_seconds: f64);

    /// Records a failed lookup for `repository`.
    fn record_fetch_failure(&self, repository: &str, reason: &str);

    /// Records the completion of one collection cycle.
    fn record_cycle(&self, duration_secs: f64);
}

/// One series of the commit age family.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub repository: String,
    pub commit_sha: String,
    pub value: f64,
}

/// Prometheus metrics collector, owning its own registry.
///
/// All writes and every snapshot go through one mutex, so a scrape never
/// observes a half-applied update (e.g. a new `commit_sha` series added while
/// the superseded one is still being removed).
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,

    // Commit metrics
    commit_age_seconds: GaugeVec,
    fetch_failures_total: CounterVec,

    // Collector metrics
    collection_cycles_total: IntCounter,
    collection_duration_seconds: Histogram,

    /// Latest `commit_sha` label per repository.
    current_shas: Arc<Mutex<HashMap<String, String>>>,
    prune_superseded_shas: bool,
}

impl Metrics {
    /// Creates a metrics instance that keeps every `commit_sha` series it has seen.
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::with_pruning(false)
    }

    /// Creates a metrics instance; with `prune_superseded_shas` the previous
    /// series of a repository is dropped once a different hash is written.
    pub fn with_pruning(prune_superseded_shas: bool) -> Result<Self, prometheus::Error> {
        let registry = Arc::new(Registry::new());

        let commit_age_seconds = register_gauge_vec_with_registry!(
            Opts::new(COMMIT_AGE_METRIC, "Age of the last commit in seconds"),
            &["repository", "commit_sha"],
            registry.clone()
        )?;

        let fetch_failures_total = register_counter_vec_with_registry!(
            Opts::new(
                FETCH_FAILURES_METRIC,
                "Total number of failed commit lookups"
            ),
            &["repository", "reason"],
            registry.clone()
        )?;

        let collection_cycles_total = register_int_counter_with_registry!(
            "github_exporter_collection_cycles_total",
            "Total number of completed collection cycles",
            registry.clone()
        )?;

        let collection_duration_seconds = register_histogram_with_registry!(
            "github_exporter_collection_duration_seconds",
            "Duration of a collection cycle in seconds",
            vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0],
            registry.clone()
        )?;

        Ok(Metrics {
            registry,
            commit_age_seconds,
            fetch_failures_total,
            collection_cycles_total,
            collection_duration_seconds,
            current_shas: Arc::new(Mutex::new(HashMap::new())),
            prune_superseded_shas,
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        // A panic while holding the lock cannot leave the map inconsistent.
        self.current_shas
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Renders all metrics in Prometheus text format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let metric_families = {
            let _guard = self.lock();
            self.registry.gather()
        };
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    /// Point-in-time copy of every commit age series, sorted by labels.
    pub fn samples(&self) -> Vec<MetricSample> {
        let metric_families = {
            let _guard = self.lock();
            self.registry.gather()
        };

        let mut samples: Vec<MetricSample> = metric_families
            .iter()
            .filter(|family| family.get_name() == COMMIT_AGE_METRIC)
            .flat_map(|family| family.get_metric())
            .map(|metric| {
                let label = |name: &str| {
                    metric
                        .get_label()
                        .iter()
                        .find(|pair| pair.get_name() == name)
                        .map(|pair| pair.get_value().to_string())
                        .unwrap_or_default()
                };
                MetricSample {
                    repository: label("repository"),
                    commit_sha: label("commit_sha"),
                    value: metric.get_gauge().get_value(),
                }
            })
            .collect();
        samples.sort_by(|a, b| {
            (&a.repository, &a.commit_sha).cmp(&(&b.repository, &b.commit_sha))
        });
        samples
    }

    /// Current value of the failure counter for one repository and reason.
    pub fn fetch_failures(&self, repository: &str, reason: &str) -> f64 {
        let metric_families = {
            let _guard = self.lock();
            self.registry.gather()
        };
        let has_label = |metric: &prometheus::proto::Metric, name: &str, value: &str| {
            metric
                .get_label()
                .iter()
                .any(|pair| pair.get_name() == name && pair.get_value() == value)
        };

        metric_families
            .iter()
            .filter(|family| family.get_name() == FETCH_FAILURES_METRIC)
            .flat_map(|family| family.get_metric())
            .find(|metric| {
                has_label(metric, "repository", repository) && has_label(metric, "reason", reason)
            })
            .map(|metric| metric.get_counter().get_value())
            .unwrap_or(0.0)
    }

    /// Number of completed collection cycles.
    pub fn cycles(&self) -> u64 {
        self.collection_cycles_total.get()
    }
}

impl MetricsRecorder for Metrics {
    fn set_commit_age(&self, repository: &str, commit_sha: &str, age_seconds: f64) {
        let mut current = self.lock();

        self.commit_age_seconds
            .with_label_values(&[repository, commit_sha])
            .set(age_seconds);

        let previous = current.insert(repository.to_string(), commit_sha.to_string());
        if let Some(previous) = previous {
            if self.prune_superseded_shas && previous != commit_sha {
                debug!(
                    repository,
                    commit_sha = previous.as_str(),
                    "removing superseded commit series"
                );
                if let Err(e) = self
                    .commit_age_seconds
                    .remove_label_values(&[repository, previous.as_str()])
                {
                    // The sha map and the gauge family disagree.
                    debug!(
                        repository,
                        commit_sha = previous.as_str(),
                        error = %e,
                        "superseded commit series was already gone"
                    );
                }
            }
        }
    }

    fn record_fetch_failure(&self, repository: &str, reason: &str) {
        let _guard = self.lock();
        self.fetch_failures_total
            .with_label_values(&[repository, reason])
            .inc();
    }

    fn record_cycle(&self, duration_secs: f64) {
        let _guard = self.lock();
        self.collection_cycles_total.inc();
        self.collection_duration_seconds.observe(duration_secs);
    }
}
