//! Delta computation, application, and wire codecs.
//!
//! A delta is an overlay (see [`kasagi_types::delta`]): applying
//! `compute_delta(prev, next)` to `prev` always reproduces `next`, and an
//! empty delta is a no-op. Equality is structural over JSON values; map
//! key order never matters.
//!
//! Two encodings exist:
//!
//! - **Frames** (`encode_frame`) -- MessagePack with named fields, sent as
//!   binary WebSocket frames to clients.
//! - **Bus payloads** (`encode_bus_payload`) -- MessagePack wrapped in
//!   base64 so the bytes are safe as coordinator pub/sub message bodies.

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use kasagi_types::{Entity, EntityDelta, FieldChanges, FullDelta, SyncFrame};

use crate::error::EngineError;

/// Compute the entity-level diff between two entity maps.
///
/// - Entities present in both emit only the fields that differ; removed
///   fields appear as `None`. Entities with no changed fields are omitted.
/// - Entities only in `next` appear as their complete field map.
/// - Entities only in `prev` appear as `None` (removed).
#[must_use]
pub fn compute_delta(
    prev: &BTreeMap<String, Entity>,
    next: &BTreeMap<String, Entity>,
) -> EntityDelta {
    let mut delta = EntityDelta::new();

    for (id, prev_entity) in prev {
        match next.get(id) {
            None => delta.mark_removed(id.clone()),
            Some(next_entity) => {
                if let Some(changes) = diff_entity(prev_entity, next_entity) {
                    delta.mark_patched(id.clone(), changes);
                }
            }
        }
    }

    for (id, next_entity) in next {
        if !prev.contains_key(id) {
            delta.mark_patched(id.clone(), full_entity_changes(next_entity));
        }
    }

    delta
}

/// Field-level diff between two versions of one entity.
///
/// Returns `None` when nothing changed.
#[must_use]
pub fn diff_entity(prev: &Entity, next: &Entity) -> Option<FieldChanges> {
    let mut changes = FieldChanges::new();

    for (field, prev_value) in prev {
        match next.get(field) {
            None => {
                changes.insert(field.clone(), None);
            }
            Some(next_value) if next_value != prev_value => {
                changes.insert(field.clone(), Some(next_value.clone()));
            }
            Some(_) => {}
        }
    }

    for (field, next_value) in next {
        if !prev.contains_key(field) {
            changes.insert(field.clone(), Some(next_value.clone()));
        }
    }

    if changes.is_empty() { None } else { Some(changes) }
}

/// A complete entity expressed as a field-map patch (used for inserts).
#[must_use]
pub fn full_entity_changes(entity: &Entity) -> FieldChanges {
    entity
        .iter()
        .map(|(field, value)| (field.clone(), Some(value.clone())))
        .collect()
}

/// Apply a delta to an entity map in place.
///
/// Per entry: `None` removes the entity; a patch inserts the entity if
/// absent, then merges field-by-field (`None` removes the field, any
/// other value replaces it).
pub fn apply_delta(entities: &mut BTreeMap<String, Entity>, delta: &EntityDelta) {
    for (id, change) in delta.iter() {
        match change {
            None => {
                entities.remove(id);
            }
            Some(patch) => {
                let entity = entities.entry(id.clone()).or_default();
                for (field, value) in patch {
                    match value {
                        None => {
                            entity.remove(field);
                        }
                        Some(v) => {
                            entity.insert(field.clone(), v.clone());
                        }
                    }
                }
            }
        }
    }
}

/// Encode a sync frame for a binary WebSocket frame.
///
/// # Errors
///
/// Returns [`EngineError::Encode`] if serialization fails.
pub fn encode_frame(frame: &SyncFrame) -> Result<Vec<u8>, EngineError> {
    Ok(rmp_serde::to_vec_named(frame)?)
}

/// Decode a binary WebSocket frame. Exists for clients and tests; the
/// server itself only ever encodes.
///
/// # Errors
///
/// Returns [`EngineError::Decode`] if the bytes are not a valid frame.
pub fn decode_frame(bytes: &[u8]) -> Result<SyncFrame, EngineError> {
    Ok(rmp_serde::from_slice(bytes)?)
}

/// Encode a `FullDelta` for the coordinator bus: MessagePack, then base64.
///
/// # Errors
///
/// Returns [`EngineError::Encode`] if serialization fails.
pub fn encode_bus_payload(full_delta: &FullDelta) -> Result<String, EngineError> {
    let bytes = rmp_serde::to_vec_named(full_delta)?;
    Ok(BASE64.encode(bytes))
}

/// Decode a coordinator bus payload back into a `FullDelta`.
///
/// # Errors
///
/// Returns [`EngineError::Base64`] or [`EngineError::Decode`] if the
/// payload is malformed.
pub fn decode_bus_payload(payload: &str) -> Result<FullDelta, EngineError> {
    let bytes = BASE64.decode(payload)?;
    Ok(rmp_serde::from_slice(&bytes)?)
}
