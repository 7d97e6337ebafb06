//! Error types for the coordinator layer.
//!
//! All failures are propagated via [`CoordinatorError`], which wraps the
//! underlying `fred` and `serde_json` errors with context about which
//! operation failed.

/// Errors that can occur in the coordinator layer.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    /// A Redis operation failed.
    #[error("redis error: {0}")]
    Redis(#[from] fred::error::Error),

    /// A serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A persisted snapshot hash is missing fields or holds unparseable values.
    #[error("corrupt snapshot for {key}: {detail}")]
    CorruptSnapshot {
        /// The hash key that was read.
        key: String,
        /// What failed to parse.
        detail: String,
    },

    /// The subscription channel was closed while messages were pending.
    #[error("subscription closed: {0}")]
    SubscriptionClosed(String),
}
