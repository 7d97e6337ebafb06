//! Shared application state for the Axum router.

use std::sync::Arc;

use kasagi_core::RoomRegistry;

/// State injected into every handler via Axum's `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The process-wide room registry.
    pub registry: Arc<RoomRegistry>,
}

impl AppState {
    /// Wrap a registry for injection into the router.
    #[must_use]
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self { registry }
    }
}
