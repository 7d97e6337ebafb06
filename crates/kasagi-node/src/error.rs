//! Error types for the node binary.

/// Errors that can occur during bootstrap or shutdown.
///
/// After bootstrap the process never terminates on recoverable errors;
/// anything that surfaces here exits with code 1.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// A configuration value is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The coordinator connection or subscription failed.
    #[error("coordinator error: {0}")]
    Coordinator(#[from] kasagi_coordinator::CoordinatorError),

    /// The engine failed during bootstrap.
    #[error("engine error: {0}")]
    Engine(#[from] kasagi_core::EngineError),

    /// The sync server failed to bind or serve.
    #[error("server error: {0}")]
    Server(#[from] kasagi_server::ServerError),
}
