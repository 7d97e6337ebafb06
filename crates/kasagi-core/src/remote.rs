//! Remote sync: coordinator subscription intake and routing.
//!
//! Every instance holds one pattern subscription covering all rooms
//! (`room:*:channel`) and routes each decoded delta to the owning room
//! via the registry. Routing deliberately calls `get_or_create`, so an
//! instance with no local sessions for a room still keeps a warm
//! in-memory copy; memory therefore grows with cluster-wide room count,
//! which is accepted.
//!
//! Malformed payloads are logged and dropped. Own echoes are dropped
//! before decode work reaches the room; the room's acceptance predicate
//! remains the correctness guarantee.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use kasagi_coordinator::{PatternMessage, keys};

use crate::codec;
use crate::error::EngineError;
use crate::registry::RoomRegistry;

/// Consumes the cross-instance delta feed and applies it to local rooms.
#[derive(Debug)]
pub struct RemoteSync {
    registry: Arc<RoomRegistry>,
}

impl RemoteSync {
    /// Subscribe to the delta pattern and spawn the intake loop.
    ///
    /// The returned handle is aborted on shutdown. The underlying
    /// subscription survives coordinator reconnects; deltas missed during
    /// an outage are healed by the next snapshot load on join.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Coordinator`] if the subscription cannot be
    /// established.
    pub async fn spawn(registry: Arc<RoomRegistry>) -> Result<JoinHandle<()>, EngineError> {
        let receiver = registry
            .context()
            .coordinator
            .subscribe_pattern(keys::DELTA_CHANNEL_PATTERN)
            .await?;
        info!(
            pattern = keys::DELTA_CHANNEL_PATTERN,
            "remote sync subscribed"
        );

        let sync = Self { registry };
        Ok(tokio::spawn(sync.run(receiver)))
    }

    async fn run(self, mut receiver: mpsc::Receiver<PatternMessage>) {
        while let Some(message) = receiver.recv().await {
            self.handle_message(&message).await;
        }
        info!("remote sync intake loop stopped");
    }

    /// Process one bus message: parse the channel, decode the payload,
    /// and route it to the owning room.
    pub async fn handle_message(&self, message: &PatternMessage) {
        let Some(channel_room) = keys::room_id_from_channel(&message.channel) else {
            debug!(channel = message.channel, "non-delta channel ignored");
            return;
        };

        let full_delta = match codec::decode_bus_payload(&message.payload) {
            Ok(full_delta) => full_delta,
            Err(e) => {
                warn!(
                    channel = message.channel,
                    error = %e,
                    "malformed remote delta dropped"
                );
                return;
            }
        };

        // Early exit before any room work; the acceptance predicate
        // checks again.
        if full_delta.instance_id == self.registry.context().instance_id {
            trace!(room = %channel_room, seq = full_delta.seq, "own echo ignored");
            return;
        }

        if full_delta.room_id != channel_room {
            warn!(
                channel = message.channel,
                payload_room = %full_delta.room_id,
                "channel/payload room mismatch, delta dropped"
            );
            return;
        }

        let room = self.registry.get_or_create(&full_delta.room_id).await;
        let applied = room.apply_remote_delta(&full_delta).await;
        trace!(room = %full_delta.room_id, seq = full_delta.seq, applied, "remote delta routed");
    }
}
