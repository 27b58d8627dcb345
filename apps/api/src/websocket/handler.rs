//! WebSocket upgrade handler for room connections
//!
//! A socket is bound to one room for its whole life. On connect the
//! client receives the current `room:init` snapshot; identity is supplied
//! later through the `join` event.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension, Path,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::dispatch::RoomEventHandler;
use super::messages::ServerEvent;
use crate::services::coordinator::TurnCoordinator;
use crate::services::registry::normalize_code;

/// WebSocket upgrade handler
///
/// Unknown rooms still get upgraded so the client can read the
/// `game:error` frame before the socket closes.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(code): Path<String>,
    Extension(coordinator): Extension<Arc<TurnCoordinator>>,
) -> Response {
    let code = normalize_code(&code);

    let snapshot = match coordinator.snapshot(&code).await {
        Ok(view) => view,
        Err(e) => {
            tracing::warn!(room = %code, error = %e, "WebSocket rejected");
            return ws.on_upgrade(move |mut socket| async move {
                let error_msg = ServerEvent::error(e.to_string());
                if let Ok(json) = serde_json::to_string(&error_msg) {
                    let _ = socket.send(Message::Text(json)).await;
                }
                let _ = socket.close().await;
            });
        }
    };

    tracing::info!(room = %code, "WebSocket connection accepted");

    ws.on_upgrade(move |socket| handle_socket(socket, code, snapshot, coordinator))
}

/// Handle an established room connection
async fn handle_socket(
    socket: WebSocket,
    code: String,
    snapshot: crate::models::RoomView,
    coordinator: Arc<TurnCoordinator>,
) {
    let connection_id = Uuid::new_v4();
    let broadcaster = coordinator.broadcaster().clone();

    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    broadcaster.add_connection(&code, connection_id, tx);

    let (mut ws_sender, mut ws_receiver) = socket.split();

    let init = ServerEvent::RoomInit(snapshot);
    if let Ok(json) = serde_json::to_string(&init) {
        if ws_sender.send(Message::Text(json)).await.is_err() {
            tracing::warn!(
                room = %code,
                connection_id = %connection_id,
                "Failed to send room snapshot"
            );
            broadcaster.remove_connection(&code, connection_id);
            return;
        }
    }

    // Forward events queued for this connection to the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json)).await.is_err() {
                        tracing::debug!(connection_id = %connection_id, "WebSocket send failed");
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, event = event.name(), "Failed to serialize event");
                }
            }
        }
    });

    let handler = RoomEventHandler::new(code.clone(), connection_id, coordinator);
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(Message::Text(text)) => handler.handle_text(&text).await,
                Ok(Message::Binary(_)) => {
                    tracing::debug!(connection_id = %connection_id, "Received unsupported binary message");
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    handler.touch();
                }
                Ok(Message::Close(_)) => {
                    tracing::debug!(connection_id = %connection_id, "WebSocket close received");
                    break;
                }
                Err(e) => {
                    tracing::debug!(error = %e, connection_id = %connection_id, "WebSocket error");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            tracing::debug!(connection_id = %connection_id, "Send task completed");
            recv_task.abort();
        }
        _ = &mut recv_task => {
            tracing::debug!(connection_id = %connection_id, "Receive task completed");
            send_task.abort();
        }
    }

    broadcaster.remove_connection(&code, connection_id);

    tracing::info!(
        room = %code,
        connection_id = %connection_id,
        "WebSocket connection closed"
    );
}
