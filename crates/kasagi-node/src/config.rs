//! Node configuration loaded from environment variables.
//!
//! Required variables:
//! - `SENTINEL_1` (and optionally `SENTINEL_2`, `SENTINEL_3`) -- Sentinel
//!   hostnames; ports come from `SENTINEL_PORT_1/2/3` (default 26379)
//!
//! Optional variables:
//! - `REDIS_MASTER_NAME` -- monitored master set name (default `kasagi-master`)
//! - `REDIS_PASSWORD` -- Redis auth password
//! - `WS_PORT` -- sync server port (default 8080)
//! - `INSTANCE_ID` -- this instance's bus identity (default: generated)
//! - `SNAPSHOT_INTERVAL` -- snapshot cadence in local ticks (default 100)
//! - `MAX_ENTITIES_PER_ROOM` -- room entity capacity (default 100)
//! - `LOG_LEVEL` -- tracing filter when `RUST_LOG` is unset (default `info`)

use kasagi_coordinator::SentinelConfig;
use kasagi_core::EngineConfig;
use kasagi_types::InstanceId;

use crate::error::NodeError;

/// Default Sentinel port when no `SENTINEL_PORT_N` override is present.
const DEFAULT_SENTINEL_PORT: u16 = 26379;

/// Complete node configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Sentinel discovery settings.
    pub sentinel: SentinelConfig,
    /// This instance's identity on the coordinator bus.
    pub instance_id: InstanceId,
    /// Port the sync server listens on.
    pub ws_port: u16,
    /// Engine tunables (snapshot cadence, room capacity).
    pub engine: EngineConfig,
}

impl NodeConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::Config`] when no sentinel endpoint is
    /// configured or a value fails to parse.
    pub fn from_env() -> Result<Self, NodeError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through a variable lookup function.
    ///
    /// Split out from [`NodeConfig::from_env`] so tests can supply
    /// variables without mutating process state.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, NodeError> {
        let mut sentinels = Vec::new();
        for index in 1..=3_u8 {
            let Some(host) = get(&format!("SENTINEL_{index}")).filter(|h| !h.is_empty()) else {
                continue;
            };
            let port = match get(&format!("SENTINEL_PORT_{index}")) {
                Some(raw) => raw.parse::<u16>().map_err(|e| {
                    NodeError::Config(format!("invalid SENTINEL_PORT_{index}: {e}"))
                })?,
                None => DEFAULT_SENTINEL_PORT,
            };
            sentinels.push((host, port));
        }
        if sentinels.is_empty() {
            return Err(NodeError::Config(
                "at least SENTINEL_1 must be set".to_owned(),
            ));
        }

        let master_name =
            get("REDIS_MASTER_NAME").unwrap_or_else(|| "kasagi-master".to_owned());
        let password = get("REDIS_PASSWORD").filter(|p| !p.is_empty());

        let ws_port = parse_or(&get, "WS_PORT", 8080_u16)?;
        let snapshot_interval = parse_or(&get, "SNAPSHOT_INTERVAL", 100_u64)?;
        let max_entities_per_room = parse_or(&get, "MAX_ENTITIES_PER_ROOM", 100_usize)?;

        let instance_id = get("INSTANCE_ID")
            .filter(|id| !id.is_empty())
            .map_or_else(InstanceId::generate, InstanceId::new);

        Ok(Self {
            sentinel: SentinelConfig {
                sentinels,
                master_name,
                password,
            },
            instance_id,
            ws_port,
            engine: EngineConfig {
                snapshot_interval,
                max_entities_per_room,
            },
        })
    }
}

/// Parse an optional variable, falling back to a default.
fn parse_or<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, NodeError>
where
    T::Err: std::fmt::Display,
{
    match get(name) {
        Some(raw) if !raw.is_empty() => raw
            .parse::<T>()
            .map_err(|e| NodeError::Config(format!("invalid {name}: {e}"))),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = NodeConfig::from_lookup(lookup(&[("SENTINEL_1", "sentinel-a")]));
        let Ok(config) = config else {
            panic!("minimal config should load");
        };
        assert_eq!(
            config.sentinel.sentinels,
            vec![("sentinel-a".to_owned(), 26379)]
        );
        assert_eq!(config.sentinel.master_name, "kasagi-master");
        assert_eq!(config.sentinel.password, None);
        assert_eq!(config.ws_port, 8080);
        assert_eq!(config.engine.snapshot_interval, 100);
        assert_eq!(config.engine.max_entities_per_room, 100);
        assert_eq!(config.instance_id.as_str().len(), 8);
    }

    #[test]
    fn all_three_sentinels_with_ports() {
        let config = NodeConfig::from_lookup(lookup(&[
            ("SENTINEL_1", "s1"),
            ("SENTINEL_2", "s2"),
            ("SENTINEL_3", "s3"),
            ("SENTINEL_PORT_2", "26380"),
        ]));
        let Ok(config) = config else {
            panic!("config should load");
        };
        assert_eq!(
            config.sentinel.sentinels,
            vec![
                ("s1".to_owned(), 26379),
                ("s2".to_owned(), 26380),
                ("s3".to_owned(), 26379),
            ]
        );
    }

    #[test]
    fn missing_sentinels_is_an_error() {
        let result = NodeConfig::from_lookup(lookup(&[]));
        assert!(matches!(result, Err(NodeError::Config(_))));
    }

    #[test]
    fn invalid_port_is_an_error() {
        let result = NodeConfig::from_lookup(lookup(&[
            ("SENTINEL_1", "s1"),
            ("WS_PORT", "not-a-port"),
        ]));
        assert!(matches!(result, Err(NodeError::Config(_))));
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = NodeConfig::from_lookup(lookup(&[
            ("SENTINEL_1", "s1"),
            ("REDIS_MASTER_NAME", "games-master"),
            ("REDIS_PASSWORD", "secret"),
            ("WS_PORT", "9001"),
            ("INSTANCE_ID", "node-7"),
            ("SNAPSHOT_INTERVAL", "50"),
            ("MAX_ENTITIES_PER_ROOM", "32"),
        ]));
        let Ok(config) = config else {
            panic!("config should load");
        };
        assert_eq!(config.sentinel.master_name, "games-master");
        assert_eq!(config.sentinel.password.as_deref(), Some("secret"));
        assert_eq!(config.ws_port, 9001);
        assert_eq!(config.instance_id, InstanceId::new("node-7"));
        assert_eq!(config.engine.snapshot_interval, 50);
        assert_eq!(config.engine.max_entities_per_room, 32);
    }
}
