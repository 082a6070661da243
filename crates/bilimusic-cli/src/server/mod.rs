//! Web front end
//!
//! A single form page plus the JSON endpoints it talks to. Extracted files
//! land in `server.download_dir` and are served back from `/download`.

mod handlers;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::info;

use bilimusic_core::{Config, Workflow};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<Workflow>,
    /// Canonical path, so containment checks compare like with like
    pub download_dir: PathBuf,
    pub extract_timeout: Option<Duration>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/api/check-env", get(handlers::check_env))
        .route("/extract", post(handlers::extract))
        .route("/download/*filename", get(handlers::download))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve until Ctrl-C
pub async fn run(config: Config) -> Result<()> {
    let server = &config.server;

    tokio::fs::create_dir_all(&server.download_dir)
        .await
        .with_context(|| format!("Cannot create download directory {}", server.download_dir.display()))?;
    let download_dir = tokio::fs::canonicalize(&server.download_dir)
        .await
        .with_context(|| format!("Cannot resolve download directory {}", server.download_dir.display()))?;

    let state = AppState {
        workflow: Arc::new(Workflow::from_config(&config)),
        download_dir,
        extract_timeout: server.extract_timeout_secs.map(Duration::from_secs),
    };
    info!("Saving downloads to {}", state.download_dir.display());

    let addr = format!("{}:{}", server.host, server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
