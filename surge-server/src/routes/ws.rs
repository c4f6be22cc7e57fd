//! WebSocket transport
//!
//! `GET /ws?token=...`. The token is checked before the upgrade; after that
//! the socket is split into a reader feeding the dispatcher and a writer
//! draining the connection's outbound channel.

use crate::auth::Identity;
use crate::state::ServerState;
use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

pub async fn ws_handler(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<WsParams>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let token = params.token.unwrap_or_default();
    let identity = match state.auth.authenticate(&token) {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!("websocket auth failed: {e}");
            return (StatusCode::UNAUTHORIZED, e.to_string()).into_response();
        }
    };

    match ws {
        Ok(ws) => ws.on_upgrade(move |socket| handle_socket(socket, state, identity)),
        Err(rejection) => rejection.into_response(),
    }
}

async fn handle_socket(socket: WebSocket, state: Arc<ServerState>, identity: Identity) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let connection = state.connect(identity, tx);

    let mut writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!("failed to encode event: {e}");
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            msg = receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => state.handle_text(connection, &text),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    tracing::debug!(%connection, "socket error: {e}");
                    break;
                }
            },
            _ = &mut writer => break,
        }
    }

    state.disconnect(connection);
    writer.abort();
}
