//! Application startup and server initialization.
//!
//! Wires the commit fetcher, the metrics store, the background collector and
//! the HTTP server together, and tears them down on SIGINT/SIGTERM.

use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::collector::Collector;
use crate::config::ConfigV1;
use crate::metrics::Metrics;
use crate::providers::{GithubFetcher, GithubFetcherConfig};
use crate::routes;
use crate::state::AppState;

/// Initializes and runs the exporter.
///
/// Binds the exposition address first so that a bind failure aborts startup
/// before any collection happens, then runs the collector in the background
/// until the server shuts down.
///
/// # Errors
///
/// Returns an error if metric registration, HTTP client creation or binding
/// to the configured address fails, or if the server stops with an error.
pub async fn run(config: Arc<ConfigV1>) -> Result<(), Box<dyn std::error::Error>> {
    let metrics = Metrics::with_pruning(config.prune_superseded_shas)?;
    let fetcher = Arc::new(GithubFetcher::new(GithubFetcherConfig {
        api_url: config.api_url.clone(),
        access_token: config.access_token.clone(),
        request_timeout: config.request_timeout,
    })?);
    let collector = Collector::new(
        fetcher,
        metrics.clone(),
        config.repo_names.clone(),
        config.scrape_interval,
    );

    let listener = TcpListener::bind(&config.bind_address).await?;
    info!("Starting Prometheus exporter on {}", config.bind_address);

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let collector_handle = tokio::spawn(async move { collector.run(shutdown_rx).await });

    let state = AppState {
        config: config.clone(),
        metrics,
    };
    let app = routes::create_router(state);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    let _ = shutdown_tx.send(());
    if let Err(e) = collector_handle.await {
        warn!("Collector task ended abnormally: {}", e);
    }

    served?;
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
