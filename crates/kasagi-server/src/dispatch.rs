//! Session dispatch: translating client messages into room operations.
//!
//! Each connection owns one [`ClientSession`]. The session tracks which
//! room and player the socket is bound to; rooms only hold the session's
//! broadcast handle. All validation failures reply with a JSON `error`
//! frame and keep the socket open.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use kasagi_core::{EngineError, InputEvent, OutboundFrame, RoomRegistry, SessionHandle};
use kasagi_types::{
    ClientMessage, ControlMessage, Entity, ErrorCode, PlayerId, RoomId, SessionId,
};

/// Server-side state for one connected client.
///
/// Owned by the socket task; destroyed on disconnect.
#[derive(Debug)]
pub struct ClientSession {
    handle: SessionHandle,
    player_id: Option<PlayerId>,
    room_id: Option<RoomId>,
}

impl ClientSession {
    /// Create a session around its broadcast handle.
    #[must_use]
    pub fn new(handle: SessionHandle) -> Self {
        Self {
            handle,
            player_id: None,
            room_id: None,
        }
    }

    /// The session's id.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.handle.id
    }

    /// Process one inbound JSON text frame.
    pub async fn handle_text(&mut self, registry: &Arc<RoomRegistry>, text: &str) {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                self.reply_error(ErrorCode::ParseError, format!("invalid JSON: {e}"));
                return;
            }
        };
        let message_type = value
            .get("type")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned);

        match serde_json::from_value::<ClientMessage>(value) {
            Ok(ClientMessage::Join { room_id, player_id }) => {
                self.handle_join(registry, room_id, player_id).await;
            }
            Ok(ClientMessage::Input {
                room_id,
                player_id,
                payload,
            }) => {
                self.handle_input(registry, &room_id, player_id, payload)
                    .await;
            }
            Err(e) => match message_type.as_deref() {
                Some(known @ ("join" | "input")) => {
                    self.reply_error(
                        ErrorCode::InvalidInput,
                        format!("malformed {known} message: {e}"),
                    );
                }
                Some(unknown) => {
                    self.reply_error(
                        ErrorCode::InvalidType,
                        format!("unknown message type: {unknown}"),
                    );
                }
                None => {
                    self.reply_error(ErrorCode::InvalidType, "missing message type");
                }
            },
        }
    }

    /// Join a room: leave any previous room, bind a player id (generating
    /// one if absent), reply `joined`, then send the binary snapshot.
    async fn handle_join(
        &mut self,
        registry: &Arc<RoomRegistry>,
        room_id: RoomId,
        player_id: Option<PlayerId>,
    ) {
        if room_id.as_str().is_empty() {
            self.reply_error(ErrorCode::InvalidRoom, "roomId must be non-empty");
            return;
        }

        if let Some(previous) = self.room_id.take() {
            registry.leave(&previous, self.id()).await;
            self.reply_control(&ControlMessage::Left { room_id: previous });
        }

        let player_id = player_id.unwrap_or_else(PlayerId::generate);
        let room = registry.join(&room_id, self.handle.clone()).await;

        self.room_id = Some(room_id.clone());
        self.player_id = Some(player_id.clone());
        debug!(session = %self.id(), room = %room_id, player = %player_id, "session joined room");

        self.reply_control(&ControlMessage::Joined { room_id, player_id });

        // The authoritative initial view follows the join ack on the same
        // queue, so the client always sees `joined` first.
        let frame = room.snapshot_frame().await;
        match OutboundFrame::sync(&frame) {
            Ok(encoded) => {
                self.handle.send(encoded);
            }
            Err(e) => {
                warn!(session = %self.id(), error = %e, "snapshot frame encode failed");
            }
        }
    }

    /// Apply an input to the session's room.
    async fn handle_input(
        &mut self,
        registry: &Arc<RoomRegistry>,
        room_id: &RoomId,
        player_id: PlayerId,
        payload: Entity,
    ) {
        if self.room_id.as_ref() != Some(room_id) {
            self.reply_error(
                ErrorCode::WrongRoom,
                format!("session is not joined to {room_id}"),
            );
            return;
        }

        let Some(room) = registry.get(room_id).await else {
            self.reply_error(ErrorCode::RoomNotFound, format!("room {room_id} not found"));
            return;
        };

        match room.apply_input(InputEvent { player_id, payload }).await {
            Ok(_) => {}
            Err(e @ EngineError::RoomFull { .. }) => {
                self.reply_error(ErrorCode::RoomFull, e.to_string());
            }
            Err(e) => {
                warn!(session = %self.id(), room = %room_id, error = %e, "input failed");
                self.reply_error(ErrorCode::InternalError, e.to_string());
            }
        }
    }

    /// Tear the session down after the socket closed: remove the player's
    /// entity (broadcast + publish), then detach from the room. The
    /// registry destroys the room when this was the last session.
    pub async fn disconnect(&mut self, registry: &Arc<RoomRegistry>) {
        let Some(room_id) = self.room_id.take() else {
            return;
        };
        debug!(session = %self.id(), room = %room_id, "session disconnected");

        if let Some(player_id) = self.player_id.take()
            && let Some(room) = registry.get(&room_id).await
        {
            // No-op when the entity is already gone.
            room.remove_entity(&player_id).await;
        }

        registry.leave(&room_id, self.id()).await;
    }

    fn reply_control(&self, message: &ControlMessage) {
        match OutboundFrame::control(message) {
            Ok(frame) => {
                self.handle.send(frame);
            }
            Err(e) => {
                warn!(session = %self.id(), error = %e, "control reply encode failed");
            }
        }
    }

    fn reply_error(&self, code: ErrorCode, message: impl Into<String>) {
        let message = message.into();
        debug!(session = %self.id(), %code, message, "client error reply");
        self.reply_control(&ControlMessage::error(code, message));
    }
}
