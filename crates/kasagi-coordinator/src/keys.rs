//! Channel and key naming scheme for the coordinator.
//!
//! | Pattern | Type | Description |
//! |---------|------|-------------|
//! | `room:{id}:channel` | Pub/sub | Base64-wrapped binary `FullDelta` messages |
//! | `room:{id}:snapshot` | Hash | Persisted room snapshot (`data`, `seq`, `tick`, `timestamp`, `instanceId`) |

use std::sync::LazyLock;

use regex::Regex;

use kasagi_types::RoomId;

/// Pattern every instance subscribes to for cross-instance delta fan-out.
pub const DELTA_CHANNEL_PATTERN: &str = "room:*:channel";

/// Matches a delta channel name and captures the room id.
static DELTA_CHANNEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    match Regex::new(r"^room:([^:]+):channel$") {
        Ok(re) => re,
        Err(_) => unreachable!("delta channel pattern is a valid regex"),
    }
});

/// Pub/sub channel carrying deltas for a room.
#[must_use]
pub fn delta_channel(room_id: &RoomId) -> String {
    format!("room:{room_id}:channel")
}

/// Hash key holding the persisted snapshot for a room.
#[must_use]
pub fn snapshot_key(room_id: &RoomId) -> String {
    format!("room:{room_id}:snapshot")
}

/// Extract the room id from a delta channel name.
///
/// Returns `None` when the channel does not match `room:{id}:channel`
/// exactly (ids containing `:` never match).
#[must_use]
pub fn room_id_from_channel(channel: &str) -> Option<RoomId> {
    DELTA_CHANNEL_RE
        .captures(channel)
        .and_then(|caps| caps.get(1))
        .map(|m| RoomId::new(m.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_name_roundtrip() {
        let room = RoomId::new("lobby");
        let channel = delta_channel(&room);
        assert_eq!(channel, "room:lobby:channel");
        assert_eq!(room_id_from_channel(&channel), Some(room));
    }

    #[test]
    fn rejects_foreign_channels() {
        assert_eq!(room_id_from_channel("room:lobby:ops"), None);
        assert_eq!(room_id_from_channel("other:lobby:channel"), None);
        assert_eq!(room_id_from_channel("room::channel"), None);
        assert_eq!(room_id_from_channel("room:a:b:channel"), None);
    }

    #[test]
    fn snapshot_key_shape() {
        assert_eq!(snapshot_key(&RoomId::new("r2")), "room:r2:snapshot");
    }
}
