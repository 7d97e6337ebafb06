//! WebSocket upgrade and the per-connection socket loop.
//!
//! Each connection runs one task that owns both halves of the socket and
//! the session's outbound queue. Room fan-out only ever touches the
//! queue, so a slow client backs up its own task and nothing else. On
//! any socket error or close the session is torn down, which removes the
//! player's entity and detaches from the room.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use tokio::sync::mpsc;
use tracing::debug;

use kasagi_core::{OutboundFrame, SessionHandle};
use kasagi_types::SessionId;

use crate::dispatch::ClientSession;
use crate::state::AppState;

/// Upgrade an HTTP request to the duplex sync socket.
///
/// # Route
///
/// `GET /ws`
pub async fn ws_sync(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Drive one client connection until it closes.
async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let session_id = SessionId::new();
    debug!(session = %session_id, "client connected");

    let (tx, mut outbound) = mpsc::unbounded_channel();
    let mut session = ClientSession::new(SessionHandle::new(session_id, tx));

    loop {
        tokio::select! {
            // Drain the session's outbound queue onto the socket.
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                let message = match frame {
                    OutboundFrame::Text(text) => Message::Text(text.into()),
                    OutboundFrame::Binary(bytes) => Message::Binary(bytes.into()),
                };
                if socket.send(message).await.is_err() {
                    debug!(session = %session_id, "send failed, closing");
                    break;
                }
            }
            // Process inbound frames.
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        session.handle_text(&state.registry, text.as_str()).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!(session = %session_id, "pong failed, closing");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(session = %session_id, "client disconnected");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Binary and pong frames from clients are ignored;
                        // the sync protocol is binary-outbound only.
                    }
                    Some(Err(e)) => {
                        debug!(session = %session_id, error = %e, "socket error");
                        break;
                    }
                }
            }
        }
    }

    session.disconnect(&state.registry).await;
}
