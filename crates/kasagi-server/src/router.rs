//! Axum router construction.
//!
//! Assembles the sync socket and the debug surface into a single
//! [`Router`] with CORS middleware enabled so browser-based dashboards
//! and game clients can connect cross-origin.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete router.
///
/// - `GET /` -- minimal HTML status page
/// - `GET /ws` -- the duplex sync socket
/// - `GET /api/stats` -- room registry statistics
///
/// CORS allows any origin for development; restrict in production.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index))
        .route("/ws", get(ws::ws_sync))
        .route("/api/stats", get(handlers::get_stats))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
