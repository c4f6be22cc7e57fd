//! SURGE Server - sessions and transport
//!
//! This crate provides the multiplayer backend:
//! - Connection hub with per-game publish/subscribe
//! - Game session manager (one engine per game, per-game exclusion)
//! - Rating-window matchmaking and private rooms
//! - WebSocket transport plus JSON status/rules endpoints
//! - Authentication and archive collaborators

pub mod archive;
pub mod auth;
pub mod config;
pub mod error;
pub mod hub;
pub mod matchmaking;
pub mod protocol;
pub mod rooms;
mod routes;
pub mod session;
mod state;

use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

pub use archive::{GameArchive, LogArchive, MemoryArchive};
pub use auth::{Authenticator, Identity};
pub use config::ServerConfig;
pub use hub::ConnectionId;
pub use protocol::{ClientCommand, ServerEvent};
pub use state::ServerState;

/// Create the router with all routes
pub fn create_router(config: &ServerConfig, state: Arc<ServerState>) -> Router {
    let router = Router::new()
        // Status endpoint
        .route("/api/status", get(routes::status::status_handler))
        // Effective rule table
        .route("/api/pieces", get(routes::pieces::get_pieces))
        // Game transport
        .route("/ws", get(routes::ws::ws_handler))
        // Shared state
        .with_state(state)
        .layer(CorsLayer::permissive());

    // Static file serving (must be last)
    match &config.static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    }
}

/// Start the HTTP server and its background tasks
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    run_server_with_archive(config, Arc::new(LogArchive)).await
}

pub async fn run_server_with_archive(
    config: ServerConfig,
    archive: Arc<dyn GameArchive>,
) -> anyhow::Result<()> {
    config.validate()?;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    let (archive_tx, archive_rx) = tokio::sync::mpsc::unbounded_channel();
    tokio::spawn(archive::run_archiver(archive_rx, archive));

    let state = Arc::new(ServerState::new(config.clone(), Some(archive_tx)));
    spawn_housekeeping(state.clone(), Duration::from_millis(config.housekeeping_ms));
    if let Some(tick) = config.session.state_tick_ms {
        spawn_snapshot_ticker(state.clone(), Duration::from_millis(tick.max(1)));
    }

    let router = create_router(&config, state);

    tracing::info!("SURGE Server starting on http://0.0.0.0:{}", config.port);
    if let Some(dir) = &config.static_dir {
        tracing::info!("Static files served from: {}", dir);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

fn spawn_housekeeping(state: Arc<ServerState>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            state.housekeeping();
        }
    });
}

fn spawn_snapshot_ticker(state: Arc<ServerState>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            state.broadcast_snapshots();
        }
    });
}
