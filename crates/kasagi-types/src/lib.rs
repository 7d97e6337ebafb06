//! Shared data model and wire protocol for the Kasagi synchronization engine.
//!
//! Everything that crosses a crate or process boundary lives here: typed
//! identifiers, the entity/delta model, and the client/server message
//! protocol. The engine treats entity fields as opaque JSON values -- only
//! equality and null-vs-present matter.
//!
//! # Modules
//!
//! - [`ids`] -- Typed identifier wrappers (rooms, players, sessions, instances)
//! - [`delta`] -- Entity maps, delta overlays, room state, and the `FullDelta`
//!   transport record
//! - [`protocol`] -- Client/server wire messages and error codes

pub mod delta;
pub mod ids;
pub mod protocol;

// Re-export primary types for convenience.
pub use delta::{Entity, EntityDelta, FieldChanges, FullDelta, RoomState};
pub use ids::{InstanceId, PlayerId, RoomId, SessionId};
pub use protocol::{ClientMessage, ControlMessage, ErrorCode, SyncFrame};
