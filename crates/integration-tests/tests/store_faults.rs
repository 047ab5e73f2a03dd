use std::sync::Arc;

use axum::http::{Method, StatusCode};
use axum::Router;
use integration_tests::{send, BrokenStore, ScriptedGenerator};
use mh_api::{build_router, AppState, Ports, Tuning};
use mh_db_memory::MemoryStore;
use serde_json::json;

fn broken_router() -> Router {
    let broken = Arc::new(BrokenStore);
    let state = AppState::assemble(
        Ports {
            memes: broken.clone(),
            votes: broken,
            bids: Arc::new(MemoryStore::new()),
            generator: Arc::new(ScriptedGenerator::default()),
        },
        Tuning::default(),
    );
    build_router(state)
}

#[tokio::test]
async fn test_store_fault_is_opaque_500() {
    let router = broken_router();
    let id = uuid::Uuid::now_v7();

    let requests = [
        (Method::GET, "/api/memes".to_string(), None),
        (Method::GET, "/api/leaderboard".to_string(), None),
        (
            Method::POST,
            "/api/memes".to_string(),
            Some(json!({ "title": "Doomed", "owner_id": "cyberpunk420" })),
        ),
        (
            Method::POST,
            format!("/api/memes/{id}/vote"),
            Some(json!({ "type": "up", "user_id": "matrixdoge" })),
        ),
        (
            Method::POST,
            format!("/api/memes/{id}/bid"),
            Some(json!({ "credits": 10, "user_id": "neonhacker" })),
        ),
    ];

    for (method, uri, body) in requests {
        let (status, body) = send(&router, method, &uri, body).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{uri}");
        assert_eq!(body, json!({ "error": "internal server error" }));
    }
}

#[tokio::test]
async fn test_validation_runs_before_store() {
    let router = broken_router();
    let id = uuid::Uuid::now_v7();

    let (status, _) = send(
        &router,
        Method::POST,
        &format!("/api/memes/{id}/bid"),
        Some(json!({ "credits": 0, "user_id": "neonhacker" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
