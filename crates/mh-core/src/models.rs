//! # Domain Models
//!
//! These structs represent the core entities of MemeHustle.
//! Memes and bids use UUID v7 so that ids sort in creation order.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// A listed meme, eligible for voting and bidding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meme {
    pub id: Uuid,
    pub title: String,
    pub image_url: String,
    /// Ordered as supplied by the creator; also drives the AI cache keys.
    pub tags: Vec<String>,
    pub owner_id: String,
    /// Net score, never negative.
    pub upvotes: i64,
    pub caption: String,
    pub vibe: String,
    pub created_at: DateTime<Utc>,
}

/// Polarity of a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            VoteDirection::Up => "up",
            VoteDirection::Down => "down",
        }
    }

    /// Unit change applied to the upvote counter when this direction is added.
    pub fn unit(self) -> i64 {
        match self {
            VoteDirection::Up => 1,
            VoteDirection::Down => -1,
        }
    }
}

impl fmt::Display for VoteDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoteDirection {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(VoteDirection::Up),
            "down" => Ok(VoteDirection::Down),
            other => Err(AppError::InvalidDirection(other.to_string())),
        }
    }
}

/// One voter's standing vote on a meme. At most one per (meme, voter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub meme_id: Uuid,
    pub user_id: String,
    pub direction: VoteDirection,
    /// Counter change the last cast actually made (0 when floored).
    pub applied: i64,
}

/// An append-only credit offer on a meme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub id: Uuid,
    pub meme_id: Uuid,
    pub user_id: String,
    pub credits: i64,
    pub created_at: DateTime<Utc>,
}

/// A meme as shown in the marketplace listing, with its derived high bid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemeListing {
    #[serde(flatten)]
    pub meme: Meme,
    /// 0 when the meme has no bids.
    pub highest_bid: i64,
    pub highest_bidder: Option<String>,
}

/// Events pushed to every connected viewer.
///
/// Serialized as `{"event": "<name>", "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum RealtimeEvent {
    MemeCreated(Meme),
    VoteUpdate {
        meme_id: Uuid,
        upvotes: i64,
        user_vote: Option<VoteDirection>,
    },
    BidUpdate {
        meme_id: Uuid,
        credits: i64,
        user_id: String,
    },
}

impl RealtimeEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RealtimeEvent::MemeCreated(_) => "meme_created",
            RealtimeEvent::VoteUpdate { .. } => "vote_update",
            RealtimeEvent::BidUpdate { .. } => "bid_update",
        }
    }
}
