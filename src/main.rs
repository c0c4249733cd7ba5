//! Depot - content resolution and promotion engine

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use depot::{config::Args, logging, runtime, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    logging::init(&args.log_level, args.log_json);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Depot - Artifact Repository Engine");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Store definitions: {}", args.data_dir.display());
    info!("Hosted storage: {}", args.storage_dir.display());
    info!("Proxy cache: {}", args.cache_dir.display());
    info!("Promotion records: {}", args.records_dir.display());
    info!("NFC TTL: {}s", args.nfc_timeout_seconds);
    info!("Origin timeout: {}ms", args.request_timeout_ms);
    info!(
        "Index warm-up: {} ({} workers)",
        if args.warm_enabled { "enabled" } else { "disabled" },
        args.warm_workers
    );
    info!("======================================");

    let state = match AppState::build(args) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("Engine wiring failed: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime::run(state).await {
        error!("Runtime error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
