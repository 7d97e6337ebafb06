//! Type-safe identifier wrappers for rooms, players, sessions, and instances.
//!
//! Rooms and players are named by clients, so their identifiers are opaque
//! strings rather than UUIDs. Wrapping them in newtypes prevents accidental
//! mixing at compile time (a `RoomId` never ends up where a `PlayerId` is
//! expected). Sessions are purely server-side and use UUID v4.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around `String` with standard derives.
macro_rules! define_name_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create an identifier from any string-like value.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Return the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the wrapper and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }
    };
}

define_name_id! {
    /// Name of a room. Chosen by clients on `join`; unique per cluster.
    RoomId
}

define_name_id! {
    /// Opaque player identifier. Client-supplied or generated on `join`.
    PlayerId
}

define_name_id! {
    /// Identifier of one running server process.
    InstanceId
}

impl PlayerId {
    /// Generate a fresh opaque player identifier.
    ///
    /// Used when a `join` request does not carry one.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("player-{}", short_uuid()))
    }
}

impl InstanceId {
    /// Generate a fresh instance identifier (used when `INSTANCE_ID` is
    /// not set in the environment).
    #[must_use]
    pub fn generate() -> Self {
        Self(short_uuid())
    }
}

/// First 8 hex characters of a fresh UUID v4.
fn short_uuid() -> String {
    let id = Uuid::new_v4().simple().to_string();
    id.chars().take(8).collect()
}

/// Unique identifier for one client socket connection.
///
/// Sessions never leave the process, so a UUID is fine here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new random session identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return the inner [`Uuid`] value.
    #[must_use]
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for SessionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_id_roundtrip_serde() {
        let original = RoomId::new("lobby");
        let json = serde_json::to_string(&original).ok();
        assert_eq!(json.as_deref(), Some("\"lobby\""));
        let restored: Result<RoomId, _> = serde_json::from_str(json.as_deref().unwrap_or(""));
        assert_eq!(restored.ok(), Some(original));
    }

    #[test]
    fn generated_player_ids_are_unique() {
        let a = PlayerId::generate();
        let b = PlayerId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("player-"));
    }

    #[test]
    fn instance_id_is_short() {
        let id = InstanceId::generate();
        assert_eq!(id.as_str().len(), 8);
    }

    #[test]
    fn session_ids_are_distinct() {
        assert_ne!(SessionId::new(), SessionId::new());
    }
}
