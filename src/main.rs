use std::sync::Arc;

use commit_age_exporter::config::{load_config, print_schema};
use commit_age_exporter::startup;
use commit_age_exporter::utils::init_logging;
use tracing::error;

// -- Entrypoint

#[tokio::main]
async fn main() {
    if std::env::args().skip(1).any(|arg| arg == "--print-schema") {
        if let Err(e) = print_schema() {
            eprintln!("Error printing configuration schema: {}", e);
            std::process::exit(1);
        }
        return;
    }

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_logging(&config.logging()) {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    if let Err(e) = startup::run(Arc::new(config)).await {
        error!("Exporter stopped: {}", e);
        std::process::exit(1);
    }
}
