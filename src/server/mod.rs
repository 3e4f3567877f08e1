use anyhow::{Context, Result};
use axum::{routing::get, Router};
use chrono::{DateTime, Utc};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::transcribe::ResilientFetcher;

pub mod handlers;
pub mod response;

/// Shared state handed to every handler
pub struct AppState {
    pub fetcher: ResilientFetcher,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(fetcher: ResilientFetcher) -> Self {
        Self {
            fetcher,
            started_at: Utc::now(),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::home))
        .route("/transcript/{video_id}", get(handlers::get_transcript))
        .route(
            "/transcript/{video_id}/{language_code}",
            get(handlers::get_transcript_with_language),
        )
        .route("/health", get(handlers::health))
        .route("/status", get(handlers::status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl+C
pub async fn serve(addr: SocketAddr, fetcher: ResilientFetcher) -> Result<()> {
    let app = router(Arc::new(AppState::new(fetcher)));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Transcript service listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("Transcript service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
