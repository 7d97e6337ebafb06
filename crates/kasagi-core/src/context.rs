//! Process-wide engine context.
//!
//! One [`EngineContext`] exists per instance and is threaded explicitly
//! through constructors (no ambient singletons), so tests can run several
//! "instances" side by side in one process against a shared coordinator.

use std::sync::Arc;

use kasagi_coordinator::{Coordinator, SnapshotStore};
use kasagi_types::InstanceId;

/// Tunables for the engine core.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Persist a snapshot every this many locally-originated ticks.
    pub snapshot_interval: u64,
    /// Maximum number of entities a room accepts.
    pub max_entities_per_room: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            snapshot_interval: 100,
            max_entities_per_room: 100,
        }
    }
}

/// Shared dependencies for every room on this instance.
#[derive(Debug)]
pub struct EngineContext {
    /// This process's identity on the bus. Stamped into every published
    /// delta and used for own-echo suppression.
    pub instance_id: InstanceId,
    /// Engine tunables.
    pub config: EngineConfig,
    /// The shared coordinator (pub/sub + hash store).
    pub coordinator: Arc<Coordinator>,
    /// Snapshot persistence over the coordinator.
    pub snapshots: SnapshotStore,
}

impl EngineContext {
    /// Assemble a context around a coordinator connection.
    pub fn new(
        instance_id: InstanceId,
        config: EngineConfig,
        coordinator: Arc<Coordinator>,
    ) -> Arc<Self> {
        let snapshots = SnapshotStore::new(Arc::clone(&coordinator));
        Arc::new(Self {
            instance_id,
            config,
            coordinator,
            snapshots,
        })
    }
}
