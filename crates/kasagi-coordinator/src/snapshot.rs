//! Room snapshot persistence on top of the coordinator hash store.
//!
//! Snapshots are the recovery mechanism: a room destroyed on one instance
//! (or an entire restarted process) is reconstructed from the last
//! persisted `(entities, seq, tick)` triple, preserving seq continuity.
//!
//! Hash layout under `room:{id}:snapshot`:
//!
//! | Field | Content |
//! |-------|---------|
//! | `data` | Entities serialized as JSON text |
//! | `seq` | Room seq at snapshot time |
//! | `tick` | Room tick at snapshot time |
//! | `timestamp` | Write time, milliseconds since the Unix epoch |
//! | `instanceId` | The instance that wrote the snapshot |

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use kasagi_types::{Entity, InstanceId, RoomId, RoomState};

use crate::coordinator::Coordinator;
use crate::error::CoordinatorError;
use crate::keys;

/// A snapshot read back from the hash store.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedSnapshot {
    /// Entities at snapshot time.
    pub entities: BTreeMap<String, Entity>,
    /// Room seq at snapshot time.
    pub seq: u64,
    /// Room tick at snapshot time.
    pub tick: u64,
    /// Write time, milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// The instance that wrote the snapshot.
    pub instance_id: InstanceId,
}

/// Persist and restore room snapshots via the coordinator hash store.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    coordinator: Arc<Coordinator>,
}

impl SnapshotStore {
    /// Create a snapshot store over a shared coordinator.
    #[must_use]
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }

    /// Persist the room's current state.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::Serialization`] if the entity map cannot
    /// be serialized, or [`CoordinatorError::Redis`] if the write fails.
    pub async fn save(
        &self,
        room_id: &RoomId,
        state: &RoomState,
        instance_id: &InstanceId,
    ) -> Result<(), CoordinatorError> {
        let data = serde_json::to_string(&state.entities)?;

        let mut fields = HashMap::new();
        fields.insert("data".to_owned(), data);
        fields.insert("seq".to_owned(), state.seq.to_string());
        fields.insert("tick".to_owned(), state.tick.to_string());
        fields.insert(
            "timestamp".to_owned(),
            Utc::now().timestamp_millis().to_string(),
        );
        fields.insert("instanceId".to_owned(), instance_id.as_str().to_owned());

        self.coordinator
            .hash_set(&keys::snapshot_key(room_id), fields)
            .await?;

        debug!(room = %room_id, seq = state.seq, tick = state.tick, "snapshot persisted");
        Ok(())
    }

    /// Load the persisted snapshot for a room, if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::Redis`] if the read fails, or
    /// [`CoordinatorError::CorruptSnapshot`] if the hash is present but
    /// holds unparseable fields.
    pub async fn load(
        &self,
        room_id: &RoomId,
    ) -> Result<Option<PersistedSnapshot>, CoordinatorError> {
        let key = keys::snapshot_key(room_id);
        let fields = self.coordinator.hash_get_all(&key).await?;
        if fields.is_empty() {
            return Ok(None);
        }

        let entities: BTreeMap<String, Entity> =
            serde_json::from_str(hash_field(&fields, &key, "data")?)
                .map_err(|e| corrupt(&key, format!("data: {e}")))?;
        let seq = parse_u64(&fields, &key, "seq")?;
        let tick = parse_u64(&fields, &key, "tick")?;
        let timestamp = hash_field(&fields, &key, "timestamp")?
            .parse::<i64>()
            .map_err(|e| corrupt(&key, format!("timestamp: {e}")))?;
        let instance_id = InstanceId::new(hash_field(&fields, &key, "instanceId")?);

        Ok(Some(PersistedSnapshot {
            entities,
            seq,
            tick,
            timestamp,
            instance_id,
        }))
    }

    /// Delete the persisted snapshot for a room.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::Redis`] if the delete fails.
    pub async fn delete(&self, room_id: &RoomId) -> Result<(), CoordinatorError> {
        self.coordinator.del(&keys::snapshot_key(room_id)).await
    }
}

fn hash_field<'a>(
    fields: &'a HashMap<String, String>,
    key: &str,
    name: &str,
) -> Result<&'a str, CoordinatorError> {
    fields
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| corrupt(key, format!("missing field {name}")))
}

fn parse_u64(
    fields: &HashMap<String, String>,
    key: &str,
    name: &str,
) -> Result<u64, CoordinatorError> {
    hash_field(fields, key, name)?
        .parse::<u64>()
        .map_err(|e| corrupt(key, format!("{name}: {e}")))
}

fn corrupt(key: &str, detail: String) -> CoordinatorError {
    CoordinatorError::CorruptSnapshot {
        key: key.to_owned(),
        detail,
    }
}
