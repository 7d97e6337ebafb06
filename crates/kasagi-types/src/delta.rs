//! Entity maps, delta overlays, and the `FullDelta` transport record.
//!
//! An entity is an untyped field map; the engine never interprets field
//! values beyond structural equality. A delta is an *overlay* over an
//! entity map: absent key means "no change", `null` means "remove".
//!
//! | Wire shape | Meaning |
//! |---|---|
//! | `{"p1": null}` | entity `p1` removed |
//! | `{"p1": {"x": 11}}` | field `x` of `p1` set to `11` |
//! | `{"p1": {"y": null}}` | field `y` of `p1` removed |
//! | `{}` | no-op |
//!
//! `null` maps to [`None`] on both nesting levels, so the Rust types mirror
//! the wire exactly for JSON and MessagePack alike.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{InstanceId, RoomId};

/// One entity: a mapping from field name to opaque JSON value.
pub type Entity = BTreeMap<String, Value>;

/// A field-level patch for one entity. `None` removes the field.
pub type FieldChanges = BTreeMap<String, Option<Value>>;

/// An entity-level diff between two room states.
///
/// Maps entity id to either `None` (entity removed) or a [`FieldChanges`]
/// overlay. New entities appear as their complete field map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityDelta(pub BTreeMap<String, Option<FieldChanges>>);

impl EntityDelta {
    /// Create an empty (no-op) delta.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff the delta has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of entities touched by the delta.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Record the removal of an entity.
    pub fn mark_removed(&mut self, entity_id: impl Into<String>) {
        self.0.insert(entity_id.into(), None);
    }

    /// Record a field-level patch for an entity.
    pub fn mark_patched(&mut self, entity_id: impl Into<String>, changes: FieldChanges) {
        self.0.insert(entity_id.into(), Some(changes));
    }

    /// Look up the change recorded for an entity, if any.
    #[must_use]
    pub fn get(&self, entity_id: &str) -> Option<&Option<FieldChanges>> {
        self.0.get(entity_id)
    }

    /// Iterate over `(entity_id, change)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Option<FieldChanges>)> {
        self.0.iter()
    }
}

/// Authoritative per-room state.
///
/// `seq` strictly increases over every applied mutation, local or remote;
/// `tick` increases as well but may jump forward when a remote delta
/// carries a higher tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomState {
    /// Live entities keyed by entity id.
    pub entities: BTreeMap<String, Entity>,
    /// Applied-update counter. May leap forward under remote absorption.
    pub tick: u64,
    /// Strictly monotonic mutation counter used for ordering and idempotence.
    pub seq: u64,
}

/// A delta with transport metadata, as published on the coordinator bus
/// and carried in binary `delta` frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullDelta {
    /// The room this delta belongs to.
    pub room_id: RoomId,
    /// The entity-level changes.
    pub delta: EntityDelta,
    /// Room tick at the moment of emission.
    pub tick: u64,
    /// Room seq at the moment of emission.
    pub seq: u64,
    /// Wall-clock emission time, milliseconds since the Unix epoch.
    pub ts: i64,
    /// The instance that produced the delta. Used for own-echo suppression.
    pub instance_id: InstanceId,
}
