//! In-memory coordinator test double.
//!
//! Implements the full capability surface without any network: hash keys
//! live in a map, and publishes fan out synchronously to every matching
//! pattern subscriber. Engine tests share one [`MemoryCoordinator`]
//! between two contexts to simulate a two-instance cluster; every
//! published message is also recorded so tests can assert on bus traffic
//! (e.g. that no delta is re-published while a remote one is applied).

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::warn;

use crate::coordinator::{PatternMessage, SUBSCRIPTION_CAPACITY};
use crate::error::CoordinatorError;

/// Glob match supporting the single-`*` patterns the engine uses
/// (`room:*:channel`). A pattern without `*` must match exactly.
pub(crate) fn pattern_matches(pattern: &str, channel: &str) -> bool {
    match pattern.split_once('*') {
        Some((prefix, suffix)) => {
            channel.len() >= prefix.len().saturating_add(suffix.len())
                && channel.starts_with(prefix)
                && channel.ends_with(suffix)
        }
        None => pattern == channel,
    }
}

struct Subscriber {
    pattern: String,
    tx: mpsc::Sender<PatternMessage>,
}

#[derive(Default)]
struct MemoryInner {
    hashes: HashMap<String, HashMap<String, String>>,
    subscribers: Vec<Subscriber>,
    published: Vec<(String, String)>,
}

/// In-process coordinator for unit and integration tests.
#[derive(Default)]
pub struct MemoryCoordinator {
    inner: Mutex<MemoryInner>,
}

impl MemoryCoordinator {
    /// Create an empty coordinator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a publish and fan it out to matching subscribers.
    ///
    /// # Errors
    ///
    /// Infallible for this backend; the signature mirrors the Redis arm.
    pub async fn publish(&self, channel: &str, payload: &str) -> Result<(), CoordinatorError> {
        let mut inner = self.lock();
        inner
            .published
            .push((channel.to_owned(), payload.to_owned()));
        inner.subscribers.retain(|subscriber| {
            if !pattern_matches(&subscriber.pattern, channel) {
                return !subscriber.tx.is_closed();
            }
            let message = PatternMessage {
                channel: channel.to_owned(),
                payload: payload.to_owned(),
            };
            match subscriber.tx.try_send(message) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(channel, "memory subscriber lagging, message dropped");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
        Ok(())
    }

    /// Register a pattern subscriber.
    ///
    /// # Errors
    ///
    /// Infallible for this backend; the signature mirrors the Redis arm.
    pub async fn subscribe_pattern(
        &self,
        pattern: &str,
    ) -> Result<mpsc::Receiver<PatternMessage>, CoordinatorError> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_CAPACITY);
        self.lock().subscribers.push(Subscriber {
            pattern: pattern.to_owned(),
            tx,
        });
        Ok(rx)
    }

    /// Set string fields on a hash key.
    ///
    /// # Errors
    ///
    /// Infallible for this backend; the signature mirrors the Redis arm.
    pub async fn hash_set(
        &self,
        key: &str,
        fields: HashMap<String, String>,
    ) -> Result<(), CoordinatorError> {
        self.lock()
            .hashes
            .entry(key.to_owned())
            .or_default()
            .extend(fields);
        Ok(())
    }

    /// Read all fields of a hash key. A missing key yields an empty map.
    ///
    /// # Errors
    ///
    /// Infallible for this backend; the signature mirrors the Redis arm.
    pub async fn hash_get_all(
        &self,
        key: &str,
    ) -> Result<HashMap<String, String>, CoordinatorError> {
        Ok(self.lock().hashes.get(key).cloned().unwrap_or_default())
    }

    /// Delete a key.
    ///
    /// # Errors
    ///
    /// Infallible for this backend; the signature mirrors the Redis arm.
    pub async fn del(&self, key: &str) -> Result<(), CoordinatorError> {
        self.lock().hashes.remove(key);
        Ok(())
    }

    /// Every `(channel, payload)` published so far, in order.
    #[must_use]
    pub fn published(&self) -> Vec<(String, String)> {
        self.lock().published.clone()
    }
}

impl std::fmt::Debug for MemoryCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("MemoryCoordinator")
            .field("hashes", &inner.hashes.len())
            .field("subscribers", &inner.subscribers.len())
            .field("published", &inner.published.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_matching() {
        assert!(pattern_matches("room:*:channel", "room:r1:channel"));
        assert!(pattern_matches("room:*:channel", "room:a:b:channel"));
        assert!(!pattern_matches("room:*:channel", "room:r1:snapshot"));
        assert!(!pattern_matches("room:*:channel", "other:r1:channel"));
        assert!(pattern_matches("exact", "exact"));
        assert!(!pattern_matches("exact", "exactly"));
    }

    #[tokio::test]
    async fn publish_reaches_matching_subscriber() {
        let coordinator = MemoryCoordinator::new();
        let mut rx = coordinator
            .subscribe_pattern("room:*:channel")
            .await
            .unwrap_or_else(|_| unreachable!("memory subscribe cannot fail"));

        coordinator
            .publish("room:r1:channel", "payload-1")
            .await
            .ok();
        coordinator.publish("room:r1:other", "ignored").await.ok();

        let message = rx.try_recv().ok();
        assert_eq!(
            message,
            Some(PatternMessage {
                channel: "room:r1:channel".to_owned(),
                payload: "payload-1".to_owned(),
            })
        );
        assert!(rx.try_recv().is_err());
        assert_eq!(coordinator.published().len(), 2);
    }

    #[tokio::test]
    async fn hash_roundtrip_and_delete() {
        let coordinator = MemoryCoordinator::new();
        let mut fields = HashMap::new();
        fields.insert("seq".to_owned(), "7".to_owned());
        coordinator.hash_set("room:r1:snapshot", fields).await.ok();

        let read = coordinator
            .hash_get_all("room:r1:snapshot")
            .await
            .unwrap_or_default();
        assert_eq!(read.get("seq").map(String::as_str), Some("7"));

        coordinator.del("room:r1:snapshot").await.ok();
        let read = coordinator
            .hash_get_all("room:r1:snapshot")
            .await
            .unwrap_or_default();
        assert!(read.is_empty());
    }
}
