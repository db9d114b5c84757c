//! Metrics collection and exposition for Prometheus.
//!
//! This module owns the commit age store read by the `/metrics` route.

mod recorder;

pub use recorder::{COMMIT_AGE_METRIC, MetricSample, Metrics, MetricsRecorder};
