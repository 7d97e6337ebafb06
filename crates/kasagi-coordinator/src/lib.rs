//! Coordinator layer for the Kasagi synchronization engine.
//!
//! Instances share room state through a Redis-compatible coordinator: a
//! pub/sub bus for cross-instance delta fan-out and a hash store for
//! durable room snapshots. This crate defines the capability surface the
//! engine needs (`publish`, `subscribe_pattern`, `hash_set`,
//! `hash_get_all`, `del`) and provides two backends behind enum dispatch:
//!
//! - [`RedisCoordinator`] -- production backend over `fred` with Sentinel
//!   discovery and automatic pattern re-subscription after reconnects.
//! - [`MemoryCoordinator`] -- in-process test double. Two engine contexts
//!   sharing one `MemoryCoordinator` form a two-node cluster in a test.
//!
//! # Modules
//!
//! - [`coordinator`] -- The [`Coordinator`] enum and subscription message type
//! - [`redis`] -- `fred`-backed production coordinator
//! - [`memory`] -- In-memory test double
//! - [`snapshot`] -- Room snapshot persistence on top of the hash store
//! - [`keys`] -- Channel/key naming scheme
//! - [`error`] -- Shared error type

pub mod coordinator;
pub mod error;
pub mod keys;
pub mod memory;
pub mod redis;
pub mod snapshot;

// Re-export primary types for convenience.
pub use coordinator::{Coordinator, PatternMessage};
pub use error::CoordinatorError;
pub use memory::MemoryCoordinator;
pub use redis::{RedisCoordinator, SentinelConfig};
pub use snapshot::{PersistedSnapshot, SnapshotStore};
