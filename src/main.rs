// StreaX - Gamified habit tracking engine
//
// Single-binary HTTP service owning the day-processing, leveling and streak
// logic for a habit tracker. The UI layer is an external consumer of the
// REST contracts exposed here.
//
// Architecture:
// - Server (axum): REST endpoints for stats, tasks, logs and day processing
// - Engine: pure leveling/streak logic plus the transactional Day Processor
// - Store (rusqlite): SQLite system of record in WAL mode

mod cli;
mod config;
mod engine;
mod error;
mod models;
mod server;
mod store;

use std::sync::Arc;

use anyhow::{Context, Result};
use config::{Config, LogRotation};
use store::Store;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Handle CLI commands first (config --show, --reset, --path)
    // If a command was handled, exit early
    if cli::handle_cli() {
        return Ok(());
    }

    // Ensure config template exists (helps users discover options)
    Config::ensure_config_exists();

    let config = Config::from_env();

    // Precedence: RUST_LOG env var > config file > default "info"
    let default_filter = format!(
        "streax={},tower_http=debug,axum=debug",
        config.logging.level
    );
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    // Set up file logging if enabled (non-blocking writer with rotation).
    // The guard must be kept alive for the duration of the program to
    // ensure logs flush.
    let _file_guard: Option<tracing_appender::non_blocking::WorkerGuard> =
        if config.logging.file_enabled {
            std::fs::create_dir_all(&config.logging.file_dir).with_context(|| {
                format!(
                    "Could not create log directory {:?}",
                    config.logging.file_dir
                )
            })?;

            let file_appender = match config.logging.file_rotation {
                LogRotation::Hourly => tracing_appender::rolling::hourly(
                    &config.logging.file_dir,
                    &config.logging.file_prefix,
                ),
                LogRotation::Daily => tracing_appender::rolling::daily(
                    &config.logging.file_dir,
                    &config.logging.file_prefix,
                ),
                LogRotation::Never => tracing_appender::rolling::never(
                    &config.logging.file_dir,
                    &config.logging.file_prefix,
                ),
            };

            // Wrap in non-blocking writer (writes happen in background thread).
            // File layer uses JSON format for structured log parsing.
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking)
                        .with_ansi(false),
                )
                .init();

            Some(guard)
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();

            None
        };

    tracing::info!("StreaX engine v{} starting", config::VERSION);

    // Open the system of record and run migrations before serving
    let store = Arc::new(Store::open(&config.db_path).context("Failed to open store")?);

    // Create shutdown channel for graceful server shutdown
    // This is a oneshot channel - it can only send one signal
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let server_config = config.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server::start_server(server_config, store, shutdown_rx).await {
            tracing::error!("Server error: {:?}", e);
        }
    });

    // Wait for Ctrl+C, then signal the server to drain and stop
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    // If the send fails, the server has already shut down (which is fine)
    let _ = shutdown_tx.send(());
    let _ = server_handle.await;

    tracing::info!("Shutdown complete");
    Ok(())
}
