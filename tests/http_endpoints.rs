//! Tests for the operational HTTP endpoints

use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower::ServiceExt;

use chat_broadcaster::config::Settings;
use chat_broadcaster::connection_manager::ConnectionHandle;
use chat_broadcaster::identity::UserIdentity;
use chat_broadcaster::server::{create_app, AppState};

async fn get(state: AppState, uri: &str) -> (StatusCode, String) {
    let app = create_app(state);
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn health_reports_empty_room() {
    let state = tokio_test::assert_ok!(AppState::new(Settings::default()));

    let (status, body) = get(state, "/health").await;
    assert_eq!(status, StatusCode::OK);

    let body: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["connections"], 0);
}

#[tokio::test]
async fn stats_lists_members_and_sequence() {
    let state = AppState::new(Settings::default()).unwrap();

    let (status, body) = get(state, "/stats").await;
    assert_eq!(status, StatusCode::OK);

    let body: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["members"], serde_json::json!([]));
    assert_eq!(body["last_sequence_id"], 0);
    assert_eq!(body["connections"]["total_connections"], 0);
}

#[tokio::test]
async fn stats_members_carry_connection_time() {
    let state = AppState::new(Settings::default()).unwrap();
    let (tx, _rx) = mpsc::channel(4);
    let handle = Arc::new(ConnectionHandle::new(UserIdentity::new(7u64, "Alice", 2), tx));
    let connected_at = handle.connected_at;
    state.registry.register(handle).unwrap();

    let (status, body) = get(state, "/stats").await;
    assert_eq!(status, StatusCode::OK);

    let body: serde_json::Value = serde_json::from_str(&body).unwrap();
    let member = &body["members"][0];
    assert_eq!(member["id"], 7);
    assert_eq!(member["name"], "Alice");
    assert_eq!(member["image"], 2);
    assert_eq!(
        member["connected_at"],
        serde_json::to_value(connected_at).unwrap()
    );
}

#[tokio::test]
async fn metrics_are_exposed() {
    let state = AppState::new(Settings::default()).unwrap();
    state.metrics.record_rejected("invalid_url");

    let (status, body) = get(state, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("chat_connections_rejected_total"));
    assert!(body.contains("chat_connections_active 0"));
}

#[tokio::test]
async fn plain_request_to_chat_path_is_not_upgraded() {
    let state = AppState::new(Settings::default()).unwrap();

    let (status, _) = get(state.clone(), "/ws/chat").await;
    assert!(status.is_client_error());
    assert!(state.registry.is_empty());
}
