//! WebSocket upgrade handler and per-connection loop.
//!
//! Lifecycle of one connection:
//! 1. Upgrade, allocate a fresh client id, register the session
//! 2. Send the `connected` greeting
//! 3. Pump outbound frames from the session channel to the socket
//! 4. Parse inbound text frames as client envelopes into the router
//! 5. On any exit path, tear the session down exactly once

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::domain::{ClientId, Timestamp};

use super::messages::{ClientEnvelope, ServerMessage};
use super::registry::RoomRegistry;
use super::router::EventRouter;

/// State required for WebSocket handling.
#[derive(Clone)]
pub struct RealtimeState {
    pub registry: Arc<RoomRegistry>,
    pub router: Arc<EventRouter>,
}

impl RealtimeState {
    pub fn new(registry: Arc<RoomRegistry>, router: Arc<EventRouter>) -> Self {
        Self { registry, router }
    }
}

#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    /// Optional user label shown in presence events. Auth is out of scope;
    /// absent a label the client id string is used.
    pub user: Option<String>,
}

/// Handle WebSocket upgrade requests.
///
/// Route: `GET /ws?user=<label>`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<ConnectQuery>,
    State(state): State<RealtimeState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, query.user, state))
}

/// Run one established WebSocket connection to completion.
async fn handle_socket(socket: WebSocket, user: Option<String>, state: RealtimeState) {
    let (mut sink, mut stream) = socket.split();

    let client_id = ClientId::new();
    let user_label = user.unwrap_or_else(|| client_id.to_string());
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();

    state
        .registry
        .connect(client_id, user_label.clone(), outbound_tx.clone());
    tracing::info!(client = %client_id, user = %user_label, "WebSocket connected");

    let greeting = ServerMessage::connected(client_id.to_string(), Timestamp::now());
    if outbound_tx.send(greeting.into_value()).is_err() {
        state.router.disconnect(client_id);
        return;
    }

    // Forward frames queued for this session to the socket.
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if let Err(e) = sink.send(Message::Text(frame.to_string())).await {
                tracing::debug!(client = %client_id, error = %e, "Send failed, closing connection");
                break;
            }
        }
    });

    // Inbound events are processed sequentially per connection, which
    // preserves per-origin submission order within each room.
    let router = Arc::clone(&state.router);
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = stream.next().await {
            match result {
                Ok(Message::Text(text)) => match serde_json::from_str::<ClientEnvelope>(&text) {
                    Ok(envelope) => router.handle_client_event(client_id, envelope),
                    Err(e) => {
                        tracing::warn!(client = %client_id, error = %e, "Ignoring malformed envelope");
                    }
                },
                Ok(Message::Binary(_)) => {
                    tracing::warn!(client = %client_id, "Ignoring unsupported binary frame");
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    // Protocol-level keepalive, handled by axum.
                }
                Ok(Message::Close(_)) => {
                    tracing::debug!(client = %client_id, "Client sent close frame");
                    break;
                }
                Err(e) => {
                    tracing::debug!(client = %client_id, error = %e, "Receive error");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    // Exactly-once teardown: removes the session from every room and
    // notifies remaining members.
    state.router.disconnect(client_id);
    tracing::info!(client = %client_id, "WebSocket disconnected");
}

/// Router for the realtime endpoint, for mounting at the app root.
pub fn realtime_router() -> Router<RealtimeState> {
    Router::new().route("/ws", get(ws_handler))
}
