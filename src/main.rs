// SolveSpace - personal problem-tracking note pad engine
// Entry point and runtime setup

use solvespace::app::Engine;
use solvespace::notify::LogNotifier;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "solvespace=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting SolveSpace engine");

    let data_dir = std::env::var_os("SOLVESPACE_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("solvespace-data"));

    let engine = Engine::start(data_dir, Arc::new(LogNotifier)).await?;

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down");
    engine.shutdown();

    Ok(())
}
