//! # mh-api
//!
//! The web routing and orchestration layer for MemeHustle.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod realtime;

use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::Router;
use tracing::info;

pub use error::ApiError;
pub use handlers::{AppState, Ports, Tuning};
pub use realtime::BroadcastNotifier;

/// Builds the full application router.
///
/// The JSON API lives under `/api`; the WebSocket feed at `/ws`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/ws", get(realtime::ws_handler))
        .nest("/api", api_routes())
        .layer(middleware::cors_policy())
        .layer(middleware::request_tracing())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/memes", get(handlers::list_memes).post(handlers::create_meme))
        .route("/memes/{id}/vote", post(handlers::vote_meme))
        .route("/memes/{id}/bid", post(handlers::bid_meme))
        .route("/memes/{id}/caption", post(handlers::caption_meme))
        .route("/leaderboard", get(handlers::leaderboard))
}

/// Serves until Ctrl+C.
pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "HTTP API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl+C, shutting down");
            }
        })
        .await?;

    Ok(())
}
