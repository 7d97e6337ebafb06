//! WebSocket transport and session dispatch for the Kasagi engine.
//!
//! One duplex socket per client: JSON text frames carry control traffic
//! (`join`, `input`, replies, errors) and binary MessagePack frames carry
//! the high-rate sync traffic (`snapshot`, `delta`). The per-connection
//! task owns the session; rooms only ever hold a lightweight broadcast
//! handle.
//!
//! # Modules
//!
//! - [`state`] -- Shared application state for the Axum router
//! - [`dispatch`] -- Translation of client messages into room operations
//! - [`ws`] -- WebSocket upgrade and the per-connection socket loop
//! - [`router`] -- Route assembly (socket, debug page, stats)
//! - [`handlers`] -- Debug page and stats endpoint
//! - [`server`] -- TCP bind and serve lifecycle

pub mod dispatch;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use dispatch::ClientSession;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use state::AppState;
