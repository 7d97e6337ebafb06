//! The Kasagi real-time synchronization engine.
//!
//! Rooms are single-threaded actors holding authoritative entity state.
//! Local inputs produce minimal deltas that fan out to the room's
//! sessions and onto the coordinator bus; deltas from other instances
//! flow back in through the remote sync loop and merge under a seq-based
//! acceptance predicate.
//!
//! ```text
//! input --> Room::apply_input --> codec (diff) --> local fan-out
//!                                      |
//!                                      +--> coordinator publish
//!
//! bus message --> RemoteSync --> RoomRegistry::get_or_create
//!                                      |
//!                                      +--> Room::apply_remote_delta --> local fan-out
//! ```
//!
//! # Modules
//!
//! - [`codec`] -- Delta computation/application and the wire codecs
//! - [`room`] -- Per-room authoritative state and mutation
//! - [`registry`] -- Process-wide room table with deduplicated creation
//! - [`broadcast`] -- Local fan-out to attached sessions
//! - [`remote`] -- Coordinator subscription intake and routing
//! - [`session`] -- Transport-agnostic session handles
//! - [`context`] -- Process-wide engine context and tunables
//! - [`error`] -- Shared error type

pub mod broadcast;
pub mod codec;
pub mod context;
pub mod error;
pub mod registry;
pub mod remote;
pub mod room;
pub mod session;

// Re-export primary types for convenience.
pub use context::{EngineConfig, EngineContext};
pub use error::EngineError;
pub use registry::{RegistryStats, RoomRegistry};
pub use remote::RemoteSync;
pub use room::{InputEvent, Room, RoomPhase, RoomStats};
pub use session::{OutboundFrame, SessionHandle};
