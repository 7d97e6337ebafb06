//! Room actors: per-room authoritative state and mutation.
//!
//! Every room behaves as a single-threaded actor. All mutation -- local
//! inputs, remote delta absorption, entity removal, session attach and
//! detach -- runs under the room's mutex, so operations on one room are
//! strictly serialized while different rooms progress in parallel.
//!
//! Mutations are atomic at room granularity: either the entity change,
//! the seq/tick bump, and the delta emission all happen, or none do. An
//! input that changes nothing leaves the room untouched, which keeps the
//! emitted seq sequence gap-free.
//!
//! Coordinator publish and snapshot failures are logged and swallowed:
//! the local fan-out has already completed and the next snapshot interval
//! retries persistence.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use kasagi_coordinator::{PersistedSnapshot, keys};
use kasagi_types::{
    Entity, EntityDelta, FullDelta, PlayerId, RoomId, RoomState, SessionId, SyncFrame,
};

use crate::broadcast;
use crate::codec;
use crate::context::EngineContext;
use crate::error::EngineError;
use crate::session::{OutboundFrame, SessionHandle};

/// Entity field stamped with the wall-clock time of the last input.
const LAST_UPDATE_FIELD: &str = "lastUpdate";

/// One client input: a field overlay for the player's entity.
#[derive(Debug, Clone)]
pub struct InputEvent {
    /// The player whose entity is mutated.
    pub player_id: PlayerId,
    /// Fields merged into the entity. A `null` value removes the field.
    pub payload: Entity,
}

/// Lifecycle of a room on this instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    /// Constructed, no session has attached yet.
    Fresh,
    /// At least one session is attached.
    Active,
    /// Last session detached; final snapshot flush in progress.
    Draining,
    /// Removed from the registry.
    Destroyed,
}

/// Per-room numbers for the debug surface.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStats {
    /// The room.
    pub room_id: RoomId,
    /// Attached session count.
    pub sessions: usize,
    /// Current tick.
    pub tick: u64,
    /// Current seq.
    pub seq: u64,
}

struct RoomInner {
    state: RoomState,
    sessions: HashMap<SessionId, SessionHandle>,
    last_snapshot_tick: u64,
    applying_remote: bool,
    phase: RoomPhase,
}

/// A named, in-memory authoritative state container.
pub struct Room {
    id: RoomId,
    ctx: Arc<EngineContext>,
    inner: Mutex<RoomInner>,
}

impl Room {
    /// Construct a fresh room at `tick = 0, seq = 0`.
    #[must_use]
    pub fn fresh(id: RoomId, ctx: Arc<EngineContext>) -> Arc<Self> {
        debug!(room = %id, "room constructed fresh");
        Self::with_state(id, ctx, RoomState::default())
    }

    /// Reconstruct a room from a persisted snapshot, preserving seq
    /// continuity across destruction and process restarts.
    #[must_use]
    pub fn from_snapshot(
        id: RoomId,
        ctx: Arc<EngineContext>,
        snapshot: PersistedSnapshot,
    ) -> Arc<Self> {
        info!(
            room = %id,
            seq = snapshot.seq,
            tick = snapshot.tick,
            "room hydrated from snapshot"
        );
        let state = RoomState {
            entities: snapshot.entities,
            tick: snapshot.tick,
            seq: snapshot.seq,
        };
        Self::with_state(id, ctx, state)
    }

    fn with_state(id: RoomId, ctx: Arc<EngineContext>, state: RoomState) -> Arc<Self> {
        let last_snapshot_tick = state.tick;
        Arc::new(Self {
            id,
            ctx,
            inner: Mutex::new(RoomInner {
                state,
                sessions: HashMap::new(),
                last_snapshot_tick,
                applying_remote: false,
                phase: RoomPhase::Fresh,
            }),
        })
    }

    /// The room's id.
    #[must_use]
    pub const fn id(&self) -> &RoomId {
        &self.id
    }

    /// Apply a local input: merge the payload into the player's entity,
    /// bump seq and tick, fan the resulting delta out locally, and
    /// publish it on the coordinator bus.
    ///
    /// An input that changes nothing (identical values, same millisecond)
    /// is a no-op and returns an empty delta without touching the room.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::RoomFull`] when the input would insert a new
    /// entity into a room at capacity.
    pub async fn apply_input(&self, input: InputEvent) -> Result<EntityDelta, EngineError> {
        let mut inner = self.inner.lock().await;
        let entity_id = input.player_id.as_str();

        let prev_entity = inner.state.entities.get(entity_id).cloned();
        if prev_entity.is_none()
            && inner.state.entities.len() >= self.ctx.config.max_entities_per_room
        {
            return Err(EngineError::RoomFull {
                room: self.id.clone(),
                max: self.ctx.config.max_entities_per_room,
            });
        }

        let mut next_entity = prev_entity.clone().unwrap_or_default();
        for (field, value) in input.payload {
            // A null value removes the field, matching the delta overlay
            // semantics so all instances converge on the same entity map.
            if value.is_null() {
                next_entity.remove(&field);
            } else {
                next_entity.insert(field, value);
            }
        }
        let timestamp = now_millis();
        next_entity.insert(LAST_UPDATE_FIELD.to_owned(), timestamp.into());

        let changes = match prev_entity {
            Some(prev) => codec::diff_entity(&prev, &next_entity),
            None => Some(codec::full_entity_changes(&next_entity)),
        };
        let Some(changes) = changes else {
            return Ok(EntityDelta::new());
        };

        inner.state.entities.insert(entity_id.to_owned(), next_entity);
        inner.state.seq += 1;
        inner.state.tick += 1;

        let mut delta = EntityDelta::new();
        delta.mark_patched(entity_id, changes);

        let (tick, seq) = (inner.state.tick, inner.state.seq);
        self.broadcast_delta(&inner, &delta, tick, seq, timestamp);
        self.publish_delta(&inner, &delta, timestamp).await;
        self.maybe_snapshot(&mut inner);

        Ok(delta)
    }

    /// Absorb a delta published by another instance.
    ///
    /// The acceptance predicate rejects own echoes
    /// (`instance_id == self`) and stale or duplicate deltas
    /// (`seq <= local seq`); a rejected delta leaves the room unchanged
    /// and returns `false`.
    ///
    /// On accept, the delta is merged, `seq` adopts the remote value,
    /// `tick` fast-forwards to `max(local, remote)`, and the delta is
    /// re-broadcast to local sessions only -- never re-published, and
    /// never counted toward the snapshot cadence (snapshots are driven by
    /// locally-originated ticks so the fleet does not duplicate the work).
    pub async fn apply_remote_delta(&self, full_delta: &FullDelta) -> bool {
        let mut inner = self.inner.lock().await;

        if full_delta.instance_id == self.ctx.instance_id {
            debug!(room = %self.id, seq = full_delta.seq, "own echo rejected");
            return false;
        }
        if full_delta.seq <= inner.state.seq {
            debug!(
                room = %self.id,
                remote_seq = full_delta.seq,
                local_seq = inner.state.seq,
                "stale remote delta rejected"
            );
            return false;
        }

        inner.applying_remote = true;
        codec::apply_delta(&mut inner.state.entities, &full_delta.delta);
        inner.state.seq = full_delta.seq;
        inner.state.tick = inner.state.tick.max(full_delta.tick);

        // The frame carries the post-merge counters: the local tick can
        // exceed the remote one when this room fast-forwarded earlier.
        let (tick, seq) = (inner.state.tick, inner.state.seq);
        self.broadcast_delta(&inner, &full_delta.delta, tick, seq, full_delta.ts);
        inner.applying_remote = false;

        debug!(
            room = %self.id,
            seq = full_delta.seq,
            origin = %full_delta.instance_id,
            "remote delta applied"
        );
        true
    }

    /// Remove a player's entity (session departure). Same mechanics as
    /// [`Room::apply_input`] with a delete as the mutation; removing an
    /// absent entity is a no-op returning an empty delta.
    pub async fn remove_entity(&self, player_id: &PlayerId) -> EntityDelta {
        let mut inner = self.inner.lock().await;

        if inner.state.entities.remove(player_id.as_str()).is_none() {
            return EntityDelta::new();
        }

        inner.state.seq += 1;
        inner.state.tick += 1;

        let mut delta = EntityDelta::new();
        delta.mark_removed(player_id.as_str());

        let timestamp = now_millis();
        let (tick, seq) = (inner.state.tick, inner.state.seq);
        self.broadcast_delta(&inner, &delta, tick, seq, timestamp);
        self.publish_delta(&inner, &delta, timestamp).await;
        self.maybe_snapshot(&mut inner);

        delta
    }

    /// The authoritative initial view sent to a newly joined client.
    pub async fn snapshot_frame(&self) -> SyncFrame {
        let inner = self.inner.lock().await;
        SyncFrame::Snapshot {
            room_id: self.id.clone(),
            state: inner.state.clone(),
            tick: inner.state.tick,
            seq: inner.state.seq,
        }
    }

    /// Persist the room's current state to the coordinator hash store.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Coordinator`] if the write fails. Callers on
    /// the cadence/shutdown paths log and swallow this.
    pub async fn save_snapshot(&self) -> Result<(), EngineError> {
        let state = {
            let mut inner = self.inner.lock().await;
            inner.last_snapshot_tick = inner.state.tick;
            inner.state.clone()
        };
        self.ctx
            .snapshots
            .save(&self.id, &state, &self.ctx.instance_id)
            .await?;
        Ok(())
    }

    /// Attach a session for broadcast. Moves the room to `Active`.
    pub async fn attach_session(&self, handle: SessionHandle) -> usize {
        let mut inner = self.inner.lock().await;
        inner.sessions.insert(handle.id, handle);
        inner.phase = RoomPhase::Active;
        inner.sessions.len()
    }

    /// Detach a session. Returns the number of sessions remaining; on
    /// zero the room moves to `Draining` and the registry destroys it.
    pub async fn detach_session(&self, session_id: SessionId) -> usize {
        let mut inner = self.inner.lock().await;
        inner.sessions.remove(&session_id);
        if inner.sessions.is_empty() {
            inner.phase = RoomPhase::Draining;
        }
        inner.sessions.len()
    }

    /// Current number of attached sessions.
    pub async fn session_count(&self) -> usize {
        self.inner.lock().await.sessions.len()
    }

    /// Current lifecycle phase.
    pub async fn phase(&self) -> RoomPhase {
        self.inner.lock().await.phase
    }

    /// Mark the room as removed from the registry.
    pub(crate) async fn mark_destroyed(&self) {
        self.inner.lock().await.phase = RoomPhase::Destroyed;
    }

    /// A copy of the current room state.
    pub async fn current_state(&self) -> RoomState {
        self.inner.lock().await.state.clone()
    }

    /// Per-room numbers for the debug surface.
    pub async fn stats(&self) -> RoomStats {
        let inner = self.inner.lock().await;
        RoomStats {
            room_id: self.id.clone(),
            sessions: inner.sessions.len(),
            tick: inner.state.tick,
            seq: inner.state.seq,
        }
    }

    /// Encode a delta frame and queue it for every attached session.
    fn broadcast_delta(
        &self,
        inner: &RoomInner,
        delta: &EntityDelta,
        tick: u64,
        seq: u64,
        timestamp: i64,
    ) {
        let frame = SyncFrame::Delta {
            room_id: self.id.clone(),
            tick,
            seq,
            delta: delta.clone(),
            timestamp,
        };
        match OutboundFrame::sync(&frame) {
            Ok(encoded) => {
                broadcast::fan_out(&self.id, inner.sessions.values(), &encoded);
            }
            Err(e) => {
                warn!(room = %self.id, seq, error = %e, "delta frame encode failed");
            }
        }
    }

    /// Publish a locally-originated delta on the coordinator bus.
    ///
    /// Suppressed while a remote delta is being applied so the bus never
    /// sees the same delta twice. Failures are logged and swallowed: the
    /// state has already mutated and the local fan-out completed.
    async fn publish_delta(&self, inner: &RoomInner, delta: &EntityDelta, ts: i64) {
        if inner.applying_remote {
            debug!(room = %self.id, "remote application in progress, publish suppressed");
            return;
        }

        let full = FullDelta {
            room_id: self.id.clone(),
            delta: delta.clone(),
            tick: inner.state.tick,
            seq: inner.state.seq,
            ts,
            instance_id: self.ctx.instance_id.clone(),
        };
        match codec::encode_bus_payload(&full) {
            Ok(payload) => {
                if let Err(e) = self
                    .ctx
                    .coordinator
                    .publish(&keys::delta_channel(&self.id), &payload)
                    .await
                {
                    warn!(room = %self.id, seq = full.seq, error = %e, "delta publish failed");
                }
            }
            Err(e) => {
                warn!(room = %self.id, seq = full.seq, error = %e, "delta encode failed");
            }
        }
    }

    /// Persist a snapshot in the background once enough local ticks have
    /// accumulated. Failures are logged; the next interval retries.
    fn maybe_snapshot(&self, inner: &mut RoomInner) {
        let due = inner.state.tick.saturating_sub(inner.last_snapshot_tick)
            >= self.ctx.config.snapshot_interval;
        if !due {
            return;
        }
        inner.last_snapshot_tick = inner.state.tick;

        let state = inner.state.clone();
        let room_id = self.id.clone();
        let ctx = Arc::clone(&self.ctx);
        tokio::spawn(async move {
            if let Err(e) = ctx.snapshots.save(&room_id, &state, &ctx.instance_id).await {
                warn!(room = %room_id, tick = state.tick, error = %e, "snapshot save failed");
            }
        });
    }
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room").field("id", &self.id).finish()
    }
}

/// Milliseconds since the Unix epoch.
fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kasagi_coordinator::{Coordinator, MemoryCoordinator};
    use kasagi_types::InstanceId;
    use serde_json::json;

    use crate::context::EngineConfig;

    fn test_ctx(instance: &str) -> Arc<EngineContext> {
        EngineContext::new(
            InstanceId::new(instance),
            EngineConfig::default(),
            Arc::new(Coordinator::Memory(MemoryCoordinator::new())),
        )
    }

    fn input(player: &str, payload: &[(&str, serde_json::Value)]) -> InputEvent {
        InputEvent {
            player_id: PlayerId::new(player),
            payload: payload
                .iter()
                .map(|(k, v)| ((*k).to_owned(), v.clone()))
                .collect(),
        }
    }

    #[tokio::test]
    async fn first_input_creates_entity_and_bumps_counters() {
        let room = Room::fresh(RoomId::new("r1"), test_ctx("A"));

        let delta = room
            .apply_input(input("p1", &[("x", json!(10)), ("y", json!(12))]))
            .await
            .unwrap_or_default();

        let state = room.current_state().await;
        assert_eq!(state.seq, 1);
        assert_eq!(state.tick, 1);

        let entity = state.entities.get("p1").cloned().unwrap_or_default();
        assert_eq!(entity.get("x"), Some(&json!(10)));
        assert_eq!(entity.get("y"), Some(&json!(12)));
        assert!(entity.contains_key(LAST_UPDATE_FIELD));

        let Some(Some(changes)) = delta.get("p1") else {
            panic!("expected a patch for p1");
        };
        assert_eq!(changes.get("x"), Some(&Some(json!(10))));
    }

    #[tokio::test]
    async fn second_input_emits_minimal_delta() {
        let room = Room::fresh(RoomId::new("r1"), test_ctx("A"));
        room.apply_input(input("p1", &[("x", json!(10)), ("y", json!(12))]))
            .await
            .ok();

        let delta = room
            .apply_input(input("p1", &[("x", json!(11))]))
            .await
            .unwrap_or_default();

        let Some(Some(changes)) = delta.get("p1") else {
            panic!("expected a patch for p1");
        };
        assert_eq!(changes.get("x"), Some(&Some(json!(11))));
        assert!(!changes.contains_key("y"), "unchanged y must be absent");

        let state = room.current_state().await;
        assert_eq!(state.seq, 2);
        assert_eq!(state.tick, 2);
        assert_eq!(
            state.entities.get("p1").and_then(|e| e.get("y")),
            Some(&json!(12))
        );
    }

    #[tokio::test]
    async fn stale_and_own_remote_deltas_are_rejected() {
        let ctx = test_ctx("A");
        let room = Room::fresh(RoomId::new("r1"), Arc::clone(&ctx));
        for step in 0..5 {
            room.apply_input(input("p1", &[("x", json!(step))]))
                .await
                .ok();
        }
        let seq_before = room.current_state().await.seq;
        assert_eq!(seq_before, 5);

        let make = |seq: u64, instance: &str| FullDelta {
            room_id: RoomId::new("r1"),
            delta: EntityDelta::new(),
            tick: seq,
            seq,
            ts: 0,
            instance_id: InstanceId::new(instance),
        };

        assert!(!room.apply_remote_delta(&make(seq_before, "B")).await);
        assert!(!room.apply_remote_delta(&make(seq_before - 1, "B")).await);
        assert!(!room.apply_remote_delta(&make(seq_before + 1, "A")).await);
        assert_eq!(room.current_state().await.seq, seq_before);

        assert!(room.apply_remote_delta(&make(seq_before + 1, "B")).await);
        assert_eq!(room.current_state().await.seq, seq_before + 1);
    }

    #[tokio::test]
    async fn accepted_remote_delta_adopts_seq_and_fast_forwards_tick() {
        let room = Room::fresh(RoomId::new("r1"), test_ctx("A"));
        room.apply_input(input("p1", &[("x", json!(1))])).await.ok();

        let mut delta = EntityDelta::new();
        let mut changes = kasagi_types::FieldChanges::new();
        changes.insert("x".to_owned(), Some(json!(99)));
        delta.mark_patched("p2", changes);

        let remote = FullDelta {
            room_id: RoomId::new("r1"),
            delta,
            tick: 40,
            seq: 7,
            ts: 0,
            instance_id: InstanceId::new("B"),
        };
        assert!(room.apply_remote_delta(&remote).await);

        let state = room.current_state().await;
        assert_eq!(state.seq, 7);
        assert_eq!(state.tick, 40);
        assert_eq!(
            state.entities.get("p2").and_then(|e| e.get("x")),
            Some(&json!(99))
        );
    }

    #[tokio::test]
    async fn remote_application_never_publishes() {
        let coordinator = Arc::new(Coordinator::Memory(MemoryCoordinator::new()));
        let ctx = EngineContext::new(
            InstanceId::new("A"),
            EngineConfig::default(),
            Arc::clone(&coordinator),
        );
        let room = Room::fresh(RoomId::new("r1"), ctx);

        let mut delta = EntityDelta::new();
        delta.mark_removed("p9");
        let remote = FullDelta {
            room_id: RoomId::new("r1"),
            delta,
            tick: 1,
            seq: 1,
            ts: 0,
            instance_id: InstanceId::new("B"),
        };
        assert!(room.apply_remote_delta(&remote).await);

        let Coordinator::Memory(memory) = coordinator.as_ref() else {
            panic!("memory coordinator expected");
        };
        assert!(memory.published().is_empty(), "remote apply must not publish");
    }

    #[tokio::test]
    async fn local_input_publishes_exactly_once() {
        let coordinator = Arc::new(Coordinator::Memory(MemoryCoordinator::new()));
        let ctx = EngineContext::new(
            InstanceId::new("A"),
            EngineConfig::default(),
            Arc::clone(&coordinator),
        );
        let room = Room::fresh(RoomId::new("r1"), ctx);
        room.apply_input(input("p1", &[("x", json!(10))])).await.ok();

        let Coordinator::Memory(memory) = coordinator.as_ref() else {
            panic!("memory coordinator expected");
        };
        let published = memory.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "room:r1:channel");

        let decoded = codec::decode_bus_payload(&published[0].1).ok();
        let Some(full) = decoded else {
            panic!("published payload must decode");
        };
        assert_eq!(full.seq, 1);
        assert_eq!(full.instance_id, InstanceId::new("A"));
    }

    #[tokio::test]
    async fn remove_entity_emits_null_and_bumps() {
        let room = Room::fresh(RoomId::new("r1"), test_ctx("A"));
        room.apply_input(input("p1", &[("x", json!(10))])).await.ok();

        let delta = room.remove_entity(&PlayerId::new("p1")).await;
        assert_eq!(delta.get("p1"), Some(&None));

        let state = room.current_state().await;
        assert_eq!(state.seq, 2);
        assert!(state.entities.is_empty());

        // Removing again is a no-op: no bump, no emission.
        let empty = room.remove_entity(&PlayerId::new("p1")).await;
        assert!(empty.is_empty());
        assert_eq!(room.current_state().await.seq, 2);
    }

    #[tokio::test]
    async fn full_room_rejects_new_entities() {
        let coordinator = Arc::new(Coordinator::Memory(MemoryCoordinator::new()));
        let ctx = EngineContext::new(
            InstanceId::new("A"),
            EngineConfig {
                snapshot_interval: 100,
                max_entities_per_room: 1,
            },
            coordinator,
        );
        let room = Room::fresh(RoomId::new("r1"), ctx);

        room.apply_input(input("p1", &[("x", json!(1))])).await.ok();
        let result = room.apply_input(input("p2", &[("x", json!(2))])).await;
        assert!(matches!(result, Err(EngineError::RoomFull { .. })));

        // Existing entities still accept updates.
        let result = room.apply_input(input("p1", &[("x", json!(3))])).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn snapshot_frame_reflects_state() {
        let room = Room::fresh(RoomId::new("r1"), test_ctx("A"));
        room.apply_input(input("p1", &[("x", json!(10))])).await.ok();

        let frame = room.snapshot_frame().await;
        let SyncFrame::Snapshot { state, tick, seq, .. } = frame else {
            panic!("expected a snapshot frame");
        };
        assert_eq!((tick, seq), (1, 1));
        assert_eq!(state.tick, 1);
        assert!(state.entities.contains_key("p1"));
    }

    #[tokio::test]
    async fn remote_delta_frame_carries_post_merge_tick() {
        let room = Room::fresh(RoomId::new("r1"), test_ctx("A"));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        room.attach_session(SessionHandle::new(SessionId::new(), tx))
            .await;

        let remote = |seq: u64, tick: u64| FullDelta {
            room_id: RoomId::new("r1"),
            delta: EntityDelta::new(),
            tick,
            seq,
            ts: 0,
            instance_id: InstanceId::new("B"),
        };

        // Fast-forward the local tick, then absorb a delta whose tick
        // lags behind it.
        assert!(room.apply_remote_delta(&remote(1, 50)).await);
        assert!(room.apply_remote_delta(&remote(2, 2)).await);

        let mut frames = Vec::new();
        while let Ok(OutboundFrame::Binary(bytes)) = rx.try_recv() {
            if let Ok(SyncFrame::Delta { tick, seq, .. }) = codec::decode_frame(&bytes) {
                frames.push((tick, seq));
            }
        }
        // Both frames report the room's counters after the merge.
        assert_eq!(frames, vec![(50, 1), (50, 2)]);
        assert_eq!(room.current_state().await.tick, 50);
    }

    #[tokio::test]
    async fn broadcast_reaches_attached_sessions() {
        let room = Room::fresh(RoomId::new("r1"), test_ctx("A"));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        room.attach_session(SessionHandle::new(SessionId::new(), tx))
            .await;

        room.apply_input(input("p1", &[("x", json!(10))])).await.ok();

        let Some(OutboundFrame::Binary(bytes)) = rx.recv().await else {
            panic!("expected a binary delta frame");
        };
        let frame = codec::decode_frame(&bytes).ok();
        let Some(SyncFrame::Delta { seq, .. }) = frame else {
            panic!("expected a delta frame");
        };
        assert_eq!(seq, 1);
    }
}
