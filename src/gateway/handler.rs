//! WebSocket endpoint: session-gated connect and per-client message pump

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;

use crate::error::AppError;

use super::{BroadcastGateway, GatewayState};

#[derive(Debug, Deserialize)]
pub struct WsConnectQuery {
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// GET /ws?sessionId=...
///
/// The session is validated before the upgrade completes; an absent or
/// expired session is answered with 401 and the socket is never opened,
/// so an unauthenticated client is never present in the broadcast set.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsConnectQuery>,
    State(state): State<GatewayState>,
) -> Response {
    let authorized = match query.session_id.as_deref() {
        Some(session_id) => state.sessions.validate(session_id).await,
        None => false,
    };

    if !authorized {
        tracing::warn!("[Gateway] Rejected unauthenticated WebSocket connect");
        return AppError::Unauthorized.into_response();
    }

    let gateway = state.gateway.clone();
    ws.on_upgrade(move |socket| client_session(socket, gateway))
}

/// One client connection: writer task draining the outbound queue, plus the
/// inbound receive loop. Ends on disconnect or read error; the connection is
/// always deregistered on the way out.
async fn client_session(socket: WebSocket, gateway: Arc<BroadcastGateway>) {
    let (mut sink, mut stream) = socket.split();
    let (conn_id, mut outbound) = gateway.register().await;

    let writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    // New clients get the current device list without waiting for a cycle
    gateway.send_snapshot_to(conn_id).await;

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => gateway.handle_inbound(&text).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!("[Gateway] Client read error: {}", e);
                break;
            }
        }
    }

    gateway.remove_connection(conn_id).await;
    writer.abort();
}
