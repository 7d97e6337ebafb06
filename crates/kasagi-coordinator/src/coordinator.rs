//! The coordinator capability surface, behind enum dispatch.
//!
//! Uses enum dispatch instead of trait objects because async methods
//! are not dyn-compatible in Rust. The engine core only ever sees
//! [`Coordinator`]; whether it is backed by Redis Sentinel or by the
//! in-memory double is a wiring decision made in the binary (or a test).

use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::error::CoordinatorError;
use crate::memory::MemoryCoordinator;
use crate::redis::RedisCoordinator;

/// Capacity of each pattern subscription channel.
///
/// If the remote sync loop falls this far behind, older bus messages are
/// dropped; the next snapshot load heals the gap.
pub(crate) const SUBSCRIPTION_CAPACITY: usize = 256;

/// One message delivered by a pattern subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMessage {
    /// The concrete channel the message arrived on.
    pub channel: String,
    /// The message body (base64 text on the delta bus).
    pub payload: String,
}

/// A pub/sub + hash-store coordinator shared by all instances.
pub enum Coordinator {
    /// Production backend over `fred` with Sentinel discovery.
    Redis(RedisCoordinator),
    /// In-process test double.
    Memory(MemoryCoordinator),
}

impl Coordinator {
    /// Publish a message body to a channel.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::Redis`] if the underlying publish fails.
    pub async fn publish(&self, channel: &str, payload: &str) -> Result<(), CoordinatorError> {
        match self {
            Self::Redis(redis) => redis.publish(channel, payload).await,
            Self::Memory(memory) => memory.publish(channel, payload).await,
        }
    }

    /// Subscribe to a glob pattern of channels.
    ///
    /// Returns the receiving half of a bounded channel; every message on a
    /// matching channel is forwarded to it. The subscription survives
    /// coordinator reconnects (the Redis arm re-issues `PSUBSCRIBE`).
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::Redis`] if the subscription cannot be
    /// established.
    pub async fn subscribe_pattern(
        &self,
        pattern: &str,
    ) -> Result<mpsc::Receiver<PatternMessage>, CoordinatorError> {
        match self {
            Self::Redis(redis) => redis.subscribe_pattern(pattern).await,
            Self::Memory(memory) => memory.subscribe_pattern(pattern).await,
        }
    }

    /// Set string fields on a hash key, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::Redis`] if the write fails.
    pub async fn hash_set(
        &self,
        key: &str,
        fields: HashMap<String, String>,
    ) -> Result<(), CoordinatorError> {
        match self {
            Self::Redis(redis) => redis.hash_set(key, fields).await,
            Self::Memory(memory) => memory.hash_set(key, fields).await,
        }
    }

    /// Read all fields of a hash key. A missing key yields an empty map.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::Redis`] if the read fails.
    pub async fn hash_get_all(
        &self,
        key: &str,
    ) -> Result<HashMap<String, String>, CoordinatorError> {
        match self {
            Self::Redis(redis) => redis.hash_get_all(key).await,
            Self::Memory(memory) => memory.hash_get_all(key).await,
        }
    }

    /// Delete a key.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::Redis`] if the delete fails.
    pub async fn del(&self, key: &str) -> Result<(), CoordinatorError> {
        match self {
            Self::Redis(redis) => redis.del(key).await,
            Self::Memory(memory) => memory.del(key).await,
        }
    }

    /// Close the underlying connections. Best-effort; used on shutdown.
    pub async fn quit(&self) {
        match self {
            Self::Redis(redis) => redis.quit().await,
            Self::Memory(_) => {}
        }
    }

    /// Human-readable backend name for logging.
    #[must_use]
    pub const fn name(&self) -> &str {
        match self {
            Self::Redis(_) => "redis-sentinel",
            Self::Memory(_) => "memory",
        }
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("backend", &self.name())
            .finish()
    }
}
