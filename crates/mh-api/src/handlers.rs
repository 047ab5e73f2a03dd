//! # mh-api Handlers
//!
//! This module coordinates the flow between HTTP requests and the services.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use mh_core::{Bid, BidRepo, Meme, MemeListing, MemeRepo, TextGenerator, VoteDirection, VoteRepo};
use mh_services::captions::DEFAULT_CACHE_CAPACITY;
use mh_services::leaderboard::{DEFAULT_CEILING, DEFAULT_TOP, DEFAULT_TTL};
use mh_services::{
    coerce_limit, BidRecorder, CaptionGenerator, LeaderboardCache, MemeCatalog, NewMeme,
    VoteLedger,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::realtime::{BroadcastNotifier, DEFAULT_CHANNEL_CAPACITY};

/// State shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<MemeCatalog>,
    pub votes: Arc<VoteLedger>,
    pub bids: Arc<BidRecorder>,
    pub leaderboard: Arc<LeaderboardCache>,
    pub realtime: Arc<BroadcastNotifier>,
    pub default_top: usize,
}

/// The adapters the services run on.
pub struct Ports {
    pub memes: Arc<dyn MemeRepo>,
    pub votes: Arc<dyn VoteRepo>,
    pub bids: Arc<dyn BidRepo>,
    pub generator: Arc<dyn TextGenerator>,
}

#[derive(Debug, Clone)]
pub struct Tuning {
    pub leaderboard_ttl: Duration,
    pub leaderboard_ceiling: i64,
    pub default_top: usize,
    pub ai_cache_capacity: usize,
    pub channel_capacity: usize,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            leaderboard_ttl: DEFAULT_TTL,
            leaderboard_ceiling: DEFAULT_CEILING,
            default_top: DEFAULT_TOP,
            ai_cache_capacity: DEFAULT_CACHE_CAPACITY,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl AppState {
    /// Wires every service over the given ports. Caches start empty.
    pub fn assemble(ports: Ports, tuning: Tuning) -> Self {
        let realtime = Arc::new(BroadcastNotifier::new(tuning.channel_capacity));
        let captions = Arc::new(CaptionGenerator::new(
            ports.generator,
            tuning.ai_cache_capacity,
        ));

        Self {
            catalog: Arc::new(MemeCatalog::new(
                ports.memes.clone(),
                ports.bids.clone(),
                captions,
                realtime.clone(),
            )),
            votes: Arc::new(VoteLedger::new(ports.votes, realtime.clone())),
            bids: Arc::new(BidRecorder::new(
                ports.memes.clone(),
                ports.bids,
                realtime.clone(),
            )),
            leaderboard: Arc::new(LeaderboardCache::new(
                ports.memes,
                tuning.leaderboard_ttl,
                tuning.leaderboard_ceiling,
            )),
            realtime,
            default_top: tuning.default_top,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateMemeRequest {
    pub title: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub owner_id: String,
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    #[serde(rename = "type")]
    pub vote_type: String,
    #[serde(default)]
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct VoteResponse {
    #[serde(flatten)]
    pub meme: Meme,
    pub user_vote: Option<VoteDirection>,
    pub message: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
pub struct BidRequest {
    pub credits: i64,
    #[serde(default)]
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub top: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub connected_clients: usize,
}

/// GET /api/memes
pub async fn list_memes(State(state): State<AppState>) -> Result<Json<Vec<MemeListing>>, ApiError> {
    Ok(Json(state.catalog.list().await?))
}

/// POST /api/memes
pub async fn create_meme(
    State(state): State<AppState>,
    payload: Result<Json<CreateMemeRequest>, JsonRejection>,
) -> Result<Json<Meme>, ApiError> {
    let Json(req) = payload?;
    let meme = state
        .catalog
        .create(NewMeme {
            title: req.title,
            image_url: req.image_url,
            tags: req.tags,
            owner_id: req.owner_id,
        })
        .await?;
    Ok(Json(meme))
}

/// POST /api/memes/{id}/vote
pub async fn vote_meme(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<VoteRequest>, JsonRejection>,
) -> Result<Json<VoteResponse>, ApiError> {
    let Path(id) = id?;
    let Json(req) = payload?;
    let direction: VoteDirection = req.vote_type.parse()?;

    let outcome = state.votes.cast_vote(id, &req.user_id, direction).await?;
    Ok(Json(VoteResponse {
        meme: outcome.meme,
        user_vote: outcome.user_vote,
        message: outcome.removed.then_some("vote removed"),
    }))
}

/// POST /api/memes/{id}/bid
pub async fn bid_meme(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<BidRequest>, JsonRejection>,
) -> Result<Json<Bid>, ApiError> {
    let Path(id) = id?;
    let Json(req) = payload?;
    Ok(Json(state.bids.place_bid(id, &req.user_id, req.credits).await?))
}

/// POST /api/memes/{id}/caption
pub async fn caption_meme(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Meme>, ApiError> {
    let Path(id) = id?;
    Ok(Json(state.catalog.refresh_caption(id).await?))
}

/// GET /api/leaderboard?top=N
pub async fn leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Vec<Meme>>, ApiError> {
    let limit = coerce_limit(query.top.as_deref(), state.default_top);
    Ok(Json(state.leaderboard.get(limit).await?))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        connected_clients: state.realtime.connected(),
    })
}
