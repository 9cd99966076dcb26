//! HTTP 路由集成测试

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::json;

use translation_relay::config::RelayConfig;
use translation_relay::coordinator::LogNotificationSink;
use translation_relay::providers::RegistryBuilder;
use translation_relay::store::MemoryContentStore;
use translation_relay::web::AppState;

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::{callback_body, relay_router, relay_state, seed_original, send};

fn default_state() -> Arc<AppState> {
    let store = MemoryContentStore::new();
    seed_original(&store);
    relay_state(
        RelayConfig::default(),
        RegistryBuilder::with_builtin_providers(),
        Arc::new(store),
        Arc::new(LogNotificationSink),
    )
}

#[tokio::test]
async fn test_health() {
    let (status, json) = send(relay_router(default_state()), "GET", "/health", &[], None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["stats"]["processed"], 0);
}

#[tokio::test]
async fn test_providers_listed_in_registration_order() {
    let (status, json) = send(
        relay_router(default_state()),
        "GET",
        "/api/providers",
        &[],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["active"], "google");

    let ids: Vec<&str> = json["providers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["google", "openai", "deeplx"]);

    // openai 没有密钥
    assert_eq!(json["providers"][0]["configured"], true);
    assert_eq!(json["providers"][0]["active"], true);
    assert_eq!(json["providers"][1]["configured"], false);
}

#[tokio::test]
async fn test_status_is_polled_after_callback() {
    let state = default_state();

    let (status, json) = send(relay_router(state.clone()), "GET", "/api/status/42/fr", &[], None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json, json!({"error": "No translation status for 42 (fr)"}));

    let (status, created) = send(
        relay_router(state.clone()),
        "POST",
        "/api/callback",
        &[],
        Some(callback_body()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["status"], "created");

    let (status, json) = send(relay_router(state), "GET", "/api/status/42/fr", &[], None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "succeeded");
    assert_eq!(json["item_id"], created["item_id"]);
    assert_eq!(json["original_id"], 42);
    assert_eq!(json["language"], "fr");
}

#[tokio::test]
async fn test_invalid_callback_payload_is_400() {
    let (status, json) = send(
        relay_router(default_state()),
        "POST",
        "/api/callback",
        &[],
        Some(json!({"source_language": "en", "original_post_id": 42})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Missing target_language");
}

#[tokio::test]
async fn test_malformed_json_is_400() {
    let router = relay_router(default_state());
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/translate")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();

    let response = tower::ServiceExt::oneshot(router, request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
