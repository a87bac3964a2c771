//! HTTP server setup and shared state
//!
//! Exposes the engine's operation contracts as REST endpoints for the UI
//! layer. All endpoints return JSON and are designed for local consumption;
//! the server binds to 127.0.0.1 by default.

pub mod api;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post, put},
    Router,
};
use tokio::net::TcpListener;

use crate::config::Config;
use crate::engine::DayProcessor;
use crate::store::Store;

/// Shared state for API handlers
///
/// The store's pool handles concurrent reads; all writes go through the
/// Day Processor, which serializes them per call with an immediate
/// transaction.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub processor: Arc<DayProcessor>,
}

/// Start the engine API server
pub async fn start_server(
    config: Config,
    store: Arc<Store>,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> Result<()> {
    let bind_addr = config.bind_addr;

    let state = AppState {
        processor: Arc::new(DayProcessor::new(store.clone())),
        store,
    };

    let app = Router::new()
        .route("/", get(api::root))
        // User provisioning and stats
        .route("/api/users", post(api::create_user))
        .route("/api/users/:user_id", get(api::get_user))
        .route("/api/users/:user_id/stats", get(api::get_user_stats))
        .route("/api/users/:user_id/activity", get(api::get_activity))
        // Task registry
        .route("/api/tasks", get(api::list_tasks).post(api::create_task))
        .route("/api/tasks/:task_id", put(api::update_task).delete(api::delete_task))
        // Completion log
        .route("/api/task-logs", get(api::list_task_logs))
        // Day processing
        .route("/api/process-day", post(api::process_day))
        .with_state(state);

    tracing::info!("Starting engine API on {}", bind_addr);

    let listener = TcpListener::bind(bind_addr)
        .await
        .context("Failed to bind to address")?;

    tracing::info!("Engine API listening on {}", bind_addr);

    // Serve until the shutdown signal fires
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_rx.await.ok();
        })
        .await
        .context("Server error")?;

    tracing::info!("Engine API shut down gracefully");
    Ok(())
}
