//! Session handles: the engine's view of one connected client.
//!
//! The transport layer owns the socket; rooms hold only a lightweight
//! handle with the sending half of the session's outbound queue. The
//! socket task drains the queue, so room fan-out never blocks on a slow
//! client. Dropping the receiving half (socket gone) makes every later
//! send fail, which the broadcaster logs and skips.

use kasagi_types::{ControlMessage, SessionId, SyncFrame};
use tokio::sync::mpsc;

use crate::codec;
use crate::error::EngineError;

/// One outbound WebSocket frame, transport-agnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// A JSON text frame (control traffic).
    Text(String),
    /// A binary frame (MessagePack sync traffic).
    Binary(Vec<u8>),
}

impl OutboundFrame {
    /// Build a text frame from a control message.
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error if serialization fails
    /// (not expected for any well-formed [`ControlMessage`]).
    pub fn control(message: &ControlMessage) -> Result<Self, serde_json::Error> {
        Ok(Self::Text(serde_json::to_string(message)?))
    }

    /// Build a binary frame from a sync frame.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Encode`] if serialization fails.
    pub fn sync(frame: &SyncFrame) -> Result<Self, EngineError> {
        Ok(Self::Binary(codec::encode_frame(frame)?))
    }
}

/// The engine-side handle for one client session.
///
/// Rooms store these for broadcast; ownership of the session itself (its
/// current room, player binding, and the socket) stays with the transport
/// layer.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    /// Unique id of the session.
    pub id: SessionId,
    outbound: mpsc::UnboundedSender<OutboundFrame>,
}

impl SessionHandle {
    /// Create a handle around the sending half of a session's outbound
    /// queue.
    #[must_use]
    pub fn new(id: SessionId, outbound: mpsc::UnboundedSender<OutboundFrame>) -> Self {
        Self { id, outbound }
    }

    /// Queue a frame for delivery. Returns `false` when the socket task
    /// has already gone away.
    pub fn send(&self, frame: OutboundFrame) -> bool {
        self.outbound.send(frame).is_ok()
    }

    /// Whether the socket side of the session is still draining frames.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.outbound.is_closed()
    }
}
