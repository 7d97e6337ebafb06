//! Redis Sentinel coordinator backend over `fred`.
//!
//! Two clients share one configuration: a command client for publish and
//! hash operations, and a dedicated subscriber client for pattern
//! subscriptions (Redis puts subscribing connections into a restricted
//! mode). `fred` reconnects both automatically; a background watcher
//! re-issues `PSUBSCRIBE` for every registered pattern whenever the
//! subscriber connection is re-established, as required for delta fan-out
//! to survive coordinator failovers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use fred::prelude::*;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::coordinator::{PatternMessage, SUBSCRIPTION_CAPACITY};
use crate::error::CoordinatorError;
use crate::memory::pattern_matches;

/// Sentinel discovery settings for the production coordinator.
#[derive(Debug, Clone)]
pub struct SentinelConfig {
    /// Sentinel endpoints as `(host, port)` pairs.
    pub sentinels: Vec<(String, u16)>,
    /// The monitored master set name (e.g. `kasagi-master`).
    pub master_name: String,
    /// Password for the Redis master, if required.
    pub password: Option<String>,
}

/// Connection handle to a Redis Sentinel cluster.
pub struct RedisCoordinator {
    client: Client,
    subscriber: Client,
    patterns: Arc<Mutex<Vec<String>>>,
}

impl RedisCoordinator {
    /// Connect to the cluster named by the Sentinel configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::Config`] if no sentinels are configured.
    /// Returns [`CoordinatorError::Redis`] if either connection fails.
    pub async fn connect(config: &SentinelConfig) -> Result<Self, CoordinatorError> {
        if config.sentinels.is_empty() {
            return Err(CoordinatorError::Config(
                "at least one sentinel endpoint is required".to_owned(),
            ));
        }

        let fred_config = Config {
            server: ServerConfig::Sentinel {
                hosts: config
                    .sentinels
                    .iter()
                    .map(|(host, port)| Server::new(host.clone(), *port))
                    .collect(),
                service_name: config.master_name.clone(),
            },
            password: config.password.clone(),
            ..Config::default()
        };

        let client = Builder::from_config(fred_config.clone()).build()?;
        client.init().await?;

        let subscriber = Builder::from_config(fred_config).build()?;
        subscriber.init().await?;

        info!(
            master = config.master_name,
            sentinels = config.sentinels.len(),
            "connected to Redis via Sentinel"
        );

        let patterns = Arc::new(Mutex::new(Vec::new()));
        spawn_resubscribe_watcher(subscriber.clone(), Arc::clone(&patterns));

        Ok(Self {
            client,
            subscriber,
            patterns,
        })
    }

    /// Publish a message body to a channel.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::Redis`] if the publish fails.
    pub async fn publish(&self, channel: &str, payload: &str) -> Result<(), CoordinatorError> {
        let receivers: i64 = self.client.publish(channel, payload).await?;
        debug!(channel, receivers, "published coordinator message");
        Ok(())
    }

    /// Subscribe to a glob pattern and forward matching messages.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::Redis`] if `PSUBSCRIBE` fails.
    pub async fn subscribe_pattern(
        &self,
        pattern: &str,
    ) -> Result<mpsc::Receiver<PatternMessage>, CoordinatorError> {
        self.subscriber.psubscribe(pattern).await?;
        if let Ok(mut registered) = self.patterns.lock() {
            registered.push(pattern.to_owned());
        }
        info!(pattern, "pattern subscription established");

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_CAPACITY);
        let mut message_rx = self.subscriber.message_rx();
        let pattern = pattern.to_owned();

        tokio::spawn(async move {
            loop {
                match message_rx.recv().await {
                    Ok(message) => {
                        let channel = message.channel.to_string();
                        if !pattern_matches(&pattern, &channel) {
                            continue;
                        }
                        let payload: String = match message.value.convert() {
                            Ok(payload) => payload,
                            Err(e) => {
                                warn!(channel, error = %e, "non-string pub/sub payload dropped");
                                continue;
                            }
                        };
                        match tx.try_send(PatternMessage { channel, payload }) {
                            Ok(()) => {}
                            Err(mpsc::error::TrySendError::Full(dropped)) => {
                                warn!(
                                    channel = dropped.channel,
                                    "subscription receiver lagging, message dropped"
                                );
                            }
                            Err(mpsc::error::TrySendError::Closed(_)) => break,
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "pub/sub consumer lagged, skipping ahead");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!(pattern, "pattern subscription forwarder stopped");
        });

        Ok(rx)
    }

    /// Set string fields on a hash key.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::Redis`] if the write fails.
    pub async fn hash_set(
        &self,
        key: &str,
        fields: HashMap<String, String>,
    ) -> Result<(), CoordinatorError> {
        let _: u64 = self.client.hset(key, fields).await?;
        Ok(())
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
        let fields: HashMap<String, String> = self.client.hgetall(key).await?;
        Ok(fields)
    }

    /// Delete a key.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::Redis`] if the delete fails.
    pub async fn del(&self, key: &str) -> Result<(), CoordinatorError> {
        let _: u64 = self.client.del(key).await?;
        Ok(())
    }

    /// Close both connections. Best-effort; failures are logged.
    pub async fn quit(&self) {
        if let Err(e) = self.subscriber.quit().await {
            warn!(error = %e, "subscriber client quit failed");
        }
        if let Err(e) = self.client.quit().await {
            warn!(error = %e, "command client quit failed");
        }
    }
}

impl std::fmt::Debug for RedisCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCoordinator")
            .field("connected", &true)
            .finish()
    }
}

/// Re-issue `PSUBSCRIBE` for every registered pattern whenever the
/// subscriber connection comes back after a drop. Deltas published during
/// the outage are lost; the next snapshot load on join heals the gap.
fn spawn_resubscribe_watcher(subscriber: Client, patterns: Arc<Mutex<Vec<String>>>) {
    tokio::spawn(async move {
        let mut reconnect_rx = subscriber.reconnect_rx();
        loop {
            match reconnect_rx.recv().await {
                Ok(server) => {
                    let registered: Vec<String> = patterns
                        .lock()
                        .map(|guard| guard.clone())
                        .unwrap_or_default();
                    for pattern in registered {
                        match subscriber.psubscribe(pattern.as_str()).await {
                            Ok(()) => {
                                info!(%server, pattern, "re-subscribed after reconnect");
                            }
                            Err(e) => {
                                warn!(%server, pattern, error = %e, "re-subscribe failed");
                            }
                        }
                    }
                }
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    });
}
