//! Integration tests for the debug surface.
//!
//! Tests drive the Axum `Router` directly via `tower::ServiceExt`
//! without starting a TCP server. This validates handler logic and
//! routing without needing a live network connection.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use kasagi_coordinator::{Coordinator, MemoryCoordinator};
use kasagi_core::{EngineConfig, EngineContext, InputEvent, RoomRegistry, SessionHandle};
use kasagi_server::{AppState, build_router};
use kasagi_types::{InstanceId, PlayerId, RoomId, SessionId};

async fn make_test_state() -> Arc<AppState> {
    let ctx = EngineContext::new(
        InstanceId::new("test-instance"),
        EngineConfig::default(),
        Arc::new(Coordinator::Memory(MemoryCoordinator::new())),
    );
    let registry = RoomRegistry::new(ctx);

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    // Keep the session's queue alive for the duration of the test state.
    std::mem::forget(rx);
    let room = registry
        .join(&RoomId::new("lobby"), SessionHandle::new(SessionId::new(), tx))
        .await;
    room.apply_input(InputEvent {
        player_id: PlayerId::new("p1"),
        payload: [("x".to_owned(), serde_json::json!(5))].into_iter().collect(),
    })
    .await
    .unwrap();

    Arc::new(AppState::new(registry))
}

#[tokio::test]
async fn index_serves_status_page() {
    let state = make_test_state().await;
    let router = build_router(state);

    let response = router
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let html = String::from_utf8_lossy(&bytes);
    assert!(html.contains("Kasagi Engine"));
    assert!(html.contains("lobby"));
}

#[tokio::test]
async fn stats_endpoint_reports_rooms_and_sessions() {
    let state = make_test_state().await;
    let router = build_router(state);

    let response = router
        .oneshot(
            Request::builder()
                .uri("/api/stats")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let stats: Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(stats["totalRooms"], 1);
    assert_eq!(stats["totalSessions"], 1);
    assert_eq!(stats["rooms"][0]["roomId"], "lobby");
    assert_eq!(stats["rooms"][0]["tick"], 1);
    assert_eq!(stats["rooms"][0]["seq"], 1);
}

#[tokio::test]
async fn unknown_route_is_404() {
    let state = make_test_state().await;
    let router = build_router(state);

    let response = router
        .oneshot(
            Request::builder()
                .uri("/api/missing")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
