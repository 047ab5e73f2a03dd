//! Shared harness for the HTTP-level tests: a router over the in-memory
//! store, a scripted text generator, and small request helpers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use mh_api::{build_router, AppState, Ports, Tuning};
use mh_core::{CastResult, Meme, MemeRepo, TextGenerator, VoteDirection, VoteRepo};
use mh_db_memory::MemoryStore;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

/// Answers every prompt with a numbered line, or fails when told to.
#[derive(Default)]
pub struct ScriptedGenerator {
    calls: AtomicUsize,
    fail: bool,
}

impl ScriptedGenerator {
    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail {
            bail!("model unavailable");
        }
        Ok(format!("generated line {n}"))
    }
}

/// A database that is always down.
pub struct BrokenStore;

#[async_trait]
impl MemeRepo for BrokenStore {
    async fn insert_meme(&self, _meme: Meme) -> anyhow::Result<Meme> {
        bail!("connection refused")
    }
    async fn get_meme(&self, _id: Uuid) -> anyhow::Result<Option<Meme>> {
        bail!("connection refused")
    }
    async fn list_memes(&self) -> anyhow::Result<Vec<Meme>> {
        bail!("connection refused")
    }
    async fn top_memes(&self, _limit: i64) -> anyhow::Result<Vec<Meme>> {
        bail!("connection refused")
    }
    async fn update_caption(&self, _id: Uuid, _caption: &str) -> anyhow::Result<Option<Meme>> {
        bail!("connection refused")
    }
}

#[async_trait]
impl VoteRepo for BrokenStore {
    async fn cast(
        &self,
        _meme_id: Uuid,
        _user_id: &str,
        _direction: VoteDirection,
    ) -> anyhow::Result<Option<CastResult>> {
        bail!("connection refused")
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub generator: Arc<ScriptedGenerator>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(Tuning::default(), ScriptedGenerator::default())
    }

    pub fn with_tuning(tuning: Tuning) -> Self {
        Self::build(tuning, ScriptedGenerator::default())
    }

    pub fn with_generator(generator: ScriptedGenerator) -> Self {
        Self::build(Tuning::default(), generator)
    }

    fn build(tuning: Tuning, generator: ScriptedGenerator) -> Self {
        let store = Arc::new(MemoryStore::new());
        let generator = Arc::new(generator);
        let state = AppState::assemble(
            Ports {
                memes: store.clone(),
                votes: store.clone(),
                bids: store.clone(),
                generator: generator.clone(),
            },
            tuning,
        );

        Self {
            router: build_router(state.clone()),
            state,
            store,
            generator,
        }
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        send(&self.router, Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        send(&self.router, Method::POST, uri, Some(body)).await
    }

    /// Creates a meme and returns its id.
    pub async fn create_meme(&self, title: &str, tags: &[&str]) -> Uuid {
        let (status, body) = self
            .post(
                "/api/memes",
                json!({ "title": title, "tags": tags, "owner_id": "cyberpunk420" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "create failed: {body}");
        body["id"]
            .as_str()
            .and_then(|id| id.parse().ok())
            .expect("created meme has an id")
    }

    pub async fn vote(&self, id: Uuid, direction: &str, user: &str) -> (StatusCode, Value) {
        self.post(
            &format!("/api/memes/{id}/vote"),
            json!({ "type": direction, "user_id": user }),
        )
        .await
    }

    pub async fn bid(&self, id: Uuid, credits: i64, user: &str) -> (StatusCode, Value) {
        self.post(
            &format!("/api/memes/{id}/bid"),
            json!({ "credits": credits, "user_id": user }),
        )
        .await
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// Sends one request through the router and decodes the JSON body.
/// An empty body decodes to `Value::Null`.
pub async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => request
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => request.body(Body::empty()),
    }
    .expect("valid request");

    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router is infallible");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("JSON body")
    };
    (status, value)
}
