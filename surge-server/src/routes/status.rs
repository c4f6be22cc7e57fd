//! Status endpoint

use crate::state::ServerState;
use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub engine: &'static str,
    pub connections: usize,
    pub games: usize,
    pub queue_size: usize,
    pub rooms: usize,
}

pub async fn status_handler(State(state): State<Arc<ServerState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        engine: "surge",
        connections: state.connection_count(),
        games: state.sessions.len(),
        queue_size: state.matchmaker.len(),
        rooms: state.rooms.len(),
    })
}
