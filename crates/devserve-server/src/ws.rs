//! WebSocket transport for the update channel.

use crate::server::SharedState;
use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use devserve_core::hmr::{Outbound, UpdateChannel};
use std::sync::Arc;
use tracing::debug;

/// Upgrade to a WebSocket and join the update channel.
pub(crate) async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> Response {
    if state.channel.is_closed() {
        return (StatusCode::SERVICE_UNAVAILABLE, "server is shutting down").into_response();
    }
    let channel = Arc::clone(&state.channel);
    ws.on_upgrade(move |socket| handle_socket(socket, channel))
}

/// Pump queued updates to one client until either side goes away.
async fn handle_socket(mut socket: WebSocket, channel: Arc<UpdateChannel>) {
    let Some(mut conn) = channel.register() else {
        let _ = socket.send(Message::Close(Some(going_away()))).await;
        return;
    };
    let conn_id = conn.id();

    loop {
        tokio::select! {
            frame = conn.recv() => match frame {
                Some(Outbound::Text(json)) => {
                    if socket.send(Message::Text(json.to_string())).await.is_err() {
                        debug!(conn_id, "write failed");
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = socket.send(Message::Close(Some(going_away()))).await;
                    break;
                }
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                // Client → server messages are ignored.
                Some(Ok(_)) => {}
            },
        }
    }

    debug!(conn_id, "websocket closed");
}

fn going_away() -> CloseFrame<'static> {
    CloseFrame {
        code: close_code::AWAY,
        reason: "server shutting down".into(),
    }
}
