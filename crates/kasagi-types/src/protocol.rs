//! Client/server wire protocol messages.
//!
//! A single WebSocket carries two framings:
//!
//! - *JSON text frames* for control traffic: [`ClientMessage`] inbound,
//!   [`ControlMessage`] outbound.
//! - *Binary frames* (MessagePack) for the high-rate sync traffic:
//!   [`SyncFrame`] outbound only.
//!
//! All variants are tagged with a lowercase `type` field and use camelCase
//! member names so payloads stay compatible across client languages.

use serde::{Deserialize, Serialize};

use crate::delta::{Entity, EntityDelta, RoomState};
use crate::ids::{PlayerId, RoomId};

/// Inbound control messages (JSON text frames).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Join a room, optionally reusing a previously assigned player id.
    #[serde(rename_all = "camelCase")]
    Join {
        /// The room to join.
        room_id: RoomId,
        /// Player id to bind; a fresh one is assigned when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        player_id: Option<PlayerId>,
    },
    /// Submit an input payload for the player's entity.
    #[serde(rename_all = "camelCase")]
    Input {
        /// The room the input targets. Must match the session's room.
        room_id: RoomId,
        /// The player whose entity is mutated.
        player_id: PlayerId,
        /// Field overlay merged into the player's entity.
        payload: Entity,
    },
}

/// Outbound control messages (JSON text frames).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlMessage {
    /// Acknowledges a successful `join`.
    #[serde(rename_all = "camelCase")]
    Joined {
        /// The room that was joined.
        room_id: RoomId,
        /// The player id now bound to the session.
        player_id: PlayerId,
    },
    /// Acknowledges leaving a room.
    #[serde(rename_all = "camelCase")]
    Left {
        /// The room that was left.
        room_id: RoomId,
    },
    /// Reports a validation or processing error. The socket stays open.
    Error {
        /// Machine-readable error code.
        code: ErrorCode,
        /// Human-readable description.
        message: String,
    },
}

/// Outbound binary frames (MessagePack).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SyncFrame {
    /// Authoritative initial view sent right after `joined`.
    #[serde(rename_all = "camelCase")]
    Snapshot {
        /// The room the snapshot describes.
        room_id: RoomId,
        /// Complete room state at join time.
        state: RoomState,
        /// Copy of `state.tick` for cheap header-only reads.
        tick: u64,
        /// Copy of `state.seq` for cheap header-only reads.
        seq: u64,
    },
    /// Minimal state update fanned out to every session in the room.
    #[serde(rename_all = "camelCase")]
    Delta {
        /// The room the delta belongs to.
        room_id: RoomId,
        /// Room tick after the mutation.
        tick: u64,
        /// Room seq after the mutation.
        seq: u64,
        /// The entity-level changes.
        delta: EntityDelta,
        /// Emission time, milliseconds since the Unix epoch.
        timestamp: i64,
    },
}

/// Error codes carried by [`ControlMessage::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The referenced room does not exist on this instance.
    RoomNotFound,
    /// The room's entity capacity is exhausted.
    RoomFull,
    /// The input payload failed validation.
    InvalidInput,
    /// The room id failed validation.
    InvalidRoom,
    /// The input targeted a room the session is not joined to.
    WrongRoom,
    /// The message `type` field is missing or unknown.
    InvalidType,
    /// The message body is not valid JSON.
    ParseError,
    /// The session is not authorized for the operation.
    Unauthorized,
    /// An unexpected server-side failure.
    InternalError,
    /// The connection is in a state that cannot accept the operation.
    ConnectionError,
}

impl ErrorCode {
    /// Wire representation of the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RoomNotFound => "ROOM_NOT_FOUND",
            Self::RoomFull => "ROOM_FULL",
            Self::InvalidInput => "INVALID_INPUT",
            Self::InvalidRoom => "INVALID_ROOM",
            Self::WrongRoom => "WRONG_ROOM",
            Self::InvalidType => "INVALID_TYPE",
            Self::ParseError => "PARSE_ERROR",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::InternalError => "INTERNAL_ERROR",
            Self::ConnectionError => "CONNECTION_ERROR",
        }
    }
}

impl core::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ControlMessage {
    /// Build an error reply from a code and message.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn join_without_player_id_parses() {
        let msg: Result<ClientMessage, _> =
            serde_json::from_value(json!({"type": "join", "roomId": "r1"}));
        assert_eq!(
            msg.ok(),
            Some(ClientMessage::Join {
                room_id: RoomId::new("r1"),
                player_id: None,
            })
        );
    }

    #[test]
    fn input_parses_with_payload() {
        let msg: Result<ClientMessage, _> = serde_json::from_value(json!({
            "type": "input",
            "roomId": "r1",
            "playerId": "p1",
            "payload": {"x": 10, "y": 12},
        }));
        let Ok(ClientMessage::Input { payload, .. }) = msg else {
            panic!("expected input message");
        };
        assert_eq!(payload.get("x"), Some(&json!(10)));
    }

    #[test]
    fn error_code_wire_names() {
        let encoded = serde_json::to_string(&ErrorCode::WrongRoom).ok();
        assert_eq!(encoded.as_deref(), Some("\"WRONG_ROOM\""));
        assert_eq!(ErrorCode::ParseError.as_str(), "PARSE_ERROR");
    }

    #[test]
    fn joined_reply_uses_camel_case() {
        let reply = ControlMessage::Joined {
            room_id: RoomId::new("r1"),
            player_id: PlayerId::new("p1"),
        };
        let text = serde_json::to_string(&reply).unwrap_or_default();
        assert_eq!(text, r#"{"type":"joined","roomId":"r1","playerId":"p1"}"#);
    }

    #[test]
    fn delta_frame_roundtrip_messagepack() {
        let frame = SyncFrame::Delta {
            room_id: RoomId::new("r1"),
            tick: 2,
            seq: 2,
            delta: EntityDelta::new(),
            timestamp: 1_700_000_000_000,
        };
        let bytes = rmp_serde::to_vec_named(&frame).unwrap_or_default();
        let back: Result<SyncFrame, _> = rmp_serde::from_slice(&bytes);
        assert_eq!(back.ok(), Some(frame));
    }
}
