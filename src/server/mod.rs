//! JSON HTTP API.

pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::assistant::Assistant;

pub use error::ApiError;

/// Shared handler state.
pub type AppState = Arc<Assistant>;

/// Largest accepted request body (voice uploads).
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(handlers::chat))
        .route("/voice", post(handlers::voice))
        .route("/audio", get(handlers::audio))
        .route("/tasks", get(handlers::tasks))
        .route("/tasks/complete", post(handlers::complete_task))
        .route("/tasks/clear", post(handlers::clear_tasks))
        .route("/memory", get(handlers::memory))
        .route("/journal", get(handlers::journal))
        .route("/journal/entry", post(handlers::journal_entry))
        .route("/journal/prompts", get(handlers::journal_prompts))
        .route("/journal/summary", get(handlers::journal_summary))
        .route("/journal/search", post(handlers::journal_search))
        .route("/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve until the process exits.
pub async fn serve(state: AppState, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", addr, e))?;
    info!(addr = %addr, provider = %state.provider(), "DayMind API listening");

    axum::serve(listener, build_router(state))
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::testing::assistant;

    #[tokio::test]
    async fn test_serve_reports_bind_failure() {
        let (assistant, _) = assistant("server_bind", "ok");
        let err = serve(Arc::new(assistant), "not-an-address").await.unwrap_err();
        assert!(err.to_string().starts_with("Failed to bind not-an-address"));
    }

    #[test]
    fn test_router_builds() {
        let (assistant, _) = assistant("server_router", "ok");
        let _router: Router = build_router(Arc::new(assistant));
    }
}
