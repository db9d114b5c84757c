//! Library exports for commit-age-exporter, shared between the binary and tests.

pub mod collector;
pub mod config;
pub mod metrics;
pub mod models;
pub mod providers;
pub mod routes;
pub mod startup;
pub mod state;
pub mod utils;
