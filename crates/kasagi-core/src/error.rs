//! Error types for the synchronization engine.

use kasagi_types::RoomId;

/// Errors that can occur inside the engine core.
///
/// Most failure modes in the engine are deliberately *not* errors: publish
/// and snapshot failures are logged and swallowed because room state has
/// already moved on. What remains is input validation and codec failures.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// An input would insert a new entity into a room at capacity.
    #[error("room {room} is full ({max} entities)")]
    RoomFull {
        /// The room that rejected the input.
        room: RoomId,
        /// The configured entity capacity.
        max: usize,
    },

    /// A coordinator operation failed.
    #[error("coordinator error: {0}")]
    Coordinator(#[from] kasagi_coordinator::CoordinatorError),

    /// MessagePack encoding failed.
    #[error("encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// MessagePack decoding failed.
    #[error("decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// A bus payload was not valid base64.
    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),
}
