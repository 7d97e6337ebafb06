//! Process-wide table of live rooms.
//!
//! The registry serializes access to its table behind one mutex and
//! deduplicates concurrent creation through a map of in-flight shared
//! futures: any number of concurrent `get_or_create` calls for the same
//! room id coalesce on a single snapshot load and observe the same
//! [`Room`] instance.
//!
//! Hydration is infallible by design -- a missing snapshot yields a fresh
//! room, and a failed snapshot load is logged and also yields a fresh
//! room (the coordinator heals it at the next snapshot write).

use std::collections::HashMap;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared, join_all};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use kasagi_types::{RoomId, SessionId};

use crate::context::EngineContext;
use crate::room::{Room, RoomStats};
use crate::session::SessionHandle;

type RoomFuture = Shared<BoxFuture<'static, Arc<Room>>>;

/// Registry-wide numbers for the debug surface.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
    /// Number of live rooms on this instance.
    pub total_rooms: usize,
    /// Number of attached sessions across all rooms.
    pub total_sessions: usize,
    /// Per-room breakdown.
    pub rooms: Vec<RoomStats>,
}

#[derive(Default)]
struct RegistryInner {
    rooms: HashMap<RoomId, Arc<Room>>,
    in_flight: HashMap<RoomId, RoomFuture>,
}

/// Process-wide table of live rooms with deduplicated async creation.
pub struct RoomRegistry {
    ctx: Arc<EngineContext>,
    inner: Mutex<RegistryInner>,
}

impl RoomRegistry {
    /// Create an empty registry bound to an engine context.
    #[must_use]
    pub fn new(ctx: Arc<EngineContext>) -> Arc<Self> {
        Arc::new(Self {
            ctx,
            inner: Mutex::new(RegistryInner::default()),
        })
    }

    /// The engine context this registry was built with.
    #[must_use]
    pub fn context(&self) -> &Arc<EngineContext> {
        &self.ctx
    }

    /// Return the room, creating it if needed.
    ///
    /// A room absent from the table is hydrated from its persisted
    /// snapshot when one exists, else constructed fresh. Concurrent calls
    /// for the same id share one hydration.
    pub async fn get_or_create(&self, room_id: &RoomId) -> Arc<Room> {
        let future = {
            let mut inner = self.inner.lock().await;
            if let Some(room) = inner.rooms.get(room_id) {
                return Arc::clone(room);
            }
            if let Some(pending) = inner.in_flight.get(room_id) {
                pending.clone()
            } else {
                let future = hydrate(Arc::clone(&self.ctx), room_id.clone())
                    .boxed()
                    .shared();
                inner.in_flight.insert(room_id.clone(), future.clone());
                future
            }
        };

        let room = future.await;

        let mut inner = self.inner.lock().await;
        inner.in_flight.remove(room_id);
        let entry = inner
            .rooms
            .entry(room_id.clone())
            .or_insert_with(|| Arc::clone(&room));
        Arc::clone(entry)
    }

    /// Look up a room without creating it.
    pub async fn get(&self, room_id: &RoomId) -> Option<Arc<Room>> {
        self.inner.lock().await.rooms.get(room_id).map(Arc::clone)
    }

    /// Join a session to a room, creating the room if needed.
    pub async fn join(&self, room_id: &RoomId, session: SessionHandle) -> Arc<Room> {
        let room = self.get_or_create(room_id).await;
        let sessions = room.attach_session(session).await;
        debug!(room = %room_id, sessions, "session joined");
        room
    }

    /// Detach a session from a room. When the last session leaves, the
    /// room is destroyed after a final snapshot flush.
    pub async fn leave(&self, room_id: &RoomId, session_id: SessionId) {
        let Some(room) = self.get(room_id).await else {
            return;
        };
        let remaining = room.detach_session(session_id).await;
        debug!(room = %room_id, remaining, "session left");
        if remaining == 0 {
            self.destroy(room_id).await;
        }
    }

    /// Flush a final snapshot (best-effort) and drop the room.
    ///
    /// A session that re-attaches while the flush is in flight keeps the
    /// room alive: the removal is skipped when the room is no longer
    /// empty.
    pub async fn destroy(&self, room_id: &RoomId) {
        let Some(room) = self.get(room_id).await else {
            return;
        };

        if let Err(e) = room.save_snapshot().await {
            warn!(room = %room_id, error = %e, "final snapshot flush failed");
        }

        let mut inner = self.inner.lock().await;
        if room.session_count().await > 0 {
            debug!(room = %room_id, "room re-joined during drain, keeping");
            return;
        }
        inner.rooms.remove(room_id);
        drop(inner);

        room.mark_destroyed().await;
        info!(room = %room_id, "room destroyed");
    }

    /// Persist every live room in parallel. Best-effort: individual
    /// failures are logged and tolerated. Called on process shutdown.
    pub async fn save_all_snapshots(&self) {
        let rooms: Vec<Arc<Room>> = {
            let inner = self.inner.lock().await;
            inner.rooms.values().map(Arc::clone).collect()
        };
        info!(rooms = rooms.len(), "flushing snapshots for all rooms");

        let flushes = rooms.iter().map(|room| {
            let room = Arc::clone(room);
            async move {
                if let Err(e) = room.save_snapshot().await {
                    warn!(room = %room.id(), error = %e, "shutdown snapshot failed");
                }
            }
        });
        join_all(flushes).await;
    }

    /// Registry-wide numbers for the debug surface.
    pub async fn stats(&self) -> RegistryStats {
        let rooms: Vec<Arc<Room>> = {
            let inner = self.inner.lock().await;
            inner.rooms.values().map(Arc::clone).collect()
        };

        let mut per_room = Vec::with_capacity(rooms.len());
        for room in rooms {
            per_room.push(room.stats().await);
        }
        per_room.sort_by(|a, b| a.room_id.cmp(&b.room_id));

        RegistryStats {
            total_rooms: per_room.len(),
            total_sessions: per_room.iter().map(|r| r.sessions).sum(),
            rooms: per_room,
        }
    }
}

impl std::fmt::Debug for RoomRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomRegistry").finish_non_exhaustive()
    }
}

/// Load the room's snapshot and construct it; never fails.
async fn hydrate(ctx: Arc<EngineContext>, room_id: RoomId) -> Arc<Room> {
    match ctx.snapshots.load(&room_id).await {
        Ok(Some(snapshot)) => Room::from_snapshot(room_id, ctx, snapshot),
        Ok(None) => Room::fresh(room_id, ctx),
        Err(e) => {
            warn!(room = %room_id, error = %e, "snapshot load failed, starting fresh");
            Room::fresh(room_id, ctx)
        }
    }
}
