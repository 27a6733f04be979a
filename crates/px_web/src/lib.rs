use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub mod error;
pub mod handlers;
pub mod state;

pub use error::ApiError;
pub use state::AppState;

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/", get(handlers::root))
        .route("/api/health", get(handlers::health))
        .route("/api/history", get(handlers::history))
        .route("/api/analyze", post(handlers::analyze))
        .route("/api/analyze/stream", post(handlers::analyze_stream))
        .route("/api/chat", post(handlers::chat))
        .layer(cors)
        .with_state(Arc::new(state))
}

/// Serves the API until ctrl-c.
pub async fn serve(state: AppState, addr: SocketAddr) -> px_core::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("🌐 Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutting down");
        })
        .await?;
    Ok(())
}

pub mod prelude {
    pub use crate::{create_app, serve, ApiError, AppState};
    pub use px_core::{Error, Result};
}
