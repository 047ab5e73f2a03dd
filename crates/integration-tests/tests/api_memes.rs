use axum::http::StatusCode;
use integration_tests::{ScriptedGenerator, TestApp};
use mh_services::captions::{CAPTION_FALLBACKS, VIBE_FALLBACKS};
use serde_json::json;

#[tokio::test]
async fn test_create_meme_fills_generated_fields() {
    let app = TestApp::new();

    let (status, meme) = app
        .post(
            "/api/memes",
            json!({
                "title": "  Doge HODL  ",
                "tags": ["crypto", " ", " funny "],
                "owner_id": "cyberpunk420"
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(meme["title"], "Doge HODL");
    assert_eq!(meme["tags"], json!(["crypto", "funny"]));
    assert_eq!(meme["upvotes"], 0);
    assert_eq!(meme["owner_id"], "cyberpunk420");
    assert_eq!(meme["caption"], "generated line 1");
    assert_eq!(meme["vibe"], "generated line 2");
    assert!(meme["image_url"]
        .as_str()
        .unwrap()
        .starts_with("https://picsum.photos/400/400?random="));
}

#[tokio::test]
async fn test_create_meme_keeps_given_image() {
    let app = TestApp::new();
    let (status, meme) = app
        .post(
            "/api/memes",
            json!({
                "title": "Stonks",
                "image_url": "https://i.imgflip.com/stonks.jpg",
                "owner_id": "neonhacker"
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(meme["image_url"], "https://i.imgflip.com/stonks.jpg");
    assert_eq!(meme["tags"], json!([]));
}

#[tokio::test]
async fn test_create_meme_rejects_blank_title() {
    let app = TestApp::new();
    let (status, body) = app
        .post("/api/memes", json!({ "title": "   ", "owner_id": "neonhacker" }))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("title"));
    assert_eq!(app.generator.calls(), 0);
}

#[tokio::test]
async fn test_create_meme_rejects_malformed_body() {
    let app = TestApp::new();
    let (status, body) = app.post("/api/memes", json!({ "tags": "nope" })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_list_is_newest_first_without_bids() {
    let app = TestApp::new();
    let first = app.create_meme("First", &["a"]).await;
    let second = app.create_meme("Second", &["b"]).await;

    let (status, list) = app.get("/api/memes").await;
    assert_eq!(status, StatusCode::OK);

    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["id"], second.to_string());
    assert_eq!(list[1]["id"], first.to_string());
    assert_eq!(list[0]["highest_bid"], 0);
    assert!(list[0]["highest_bidder"].is_null());
}

#[tokio::test]
async fn test_generation_failure_serves_fallbacks() {
    let app = TestApp::with_generator(ScriptedGenerator::failing());

    let (status, meme) = app
        .post(
            "/api/memes",
            json!({ "title": "Glitch", "tags": ["retro"], "owner_id": "synthwave99" }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(CAPTION_FALLBACKS.contains(&meme["caption"].as_str().unwrap()));
    assert!(VIBE_FALLBACKS.contains(&meme["vibe"].as_str().unwrap()));
}

#[tokio::test]
async fn test_caption_refresh_reuses_memoized_caption() {
    let app = TestApp::new();
    let id = app.create_meme("Cat Matrix", &["cat", "matrix"]).await;
    let calls = app.generator.calls();

    let (status, meme) = app.post(&format!("/api/memes/{id}/caption"), json!({})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(meme["caption"], "generated line 1");
    assert_eq!(app.generator.calls(), calls);
}

#[tokio::test]
async fn test_caption_refresh_retries_after_fallback() {
    let app = TestApp::with_generator(ScriptedGenerator::failing());
    let id = app.create_meme("Cat Matrix", &["cat"]).await;
    let calls = app.generator.calls();

    let (status, meme) = app.post(&format!("/api/memes/{id}/caption"), json!({})).await;

    assert_eq!(status, StatusCode::OK);
    assert!(CAPTION_FALLBACKS.contains(&meme["caption"].as_str().unwrap()));
    assert_eq!(app.generator.calls(), calls + 1);
}

#[tokio::test]
async fn test_caption_refresh_unknown_meme() {
    let app = TestApp::new();
    let (status, body) = app
        .post(
            "/api/memes/0191e7a4-0000-7000-8000-000000000000/caption",
            json!({}),
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_health_reports_status() {
    let app = TestApp::new();
    let (status, body) = app.get("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["connected_clients"], 0);
    assert!(body["version"].is_string());
}
