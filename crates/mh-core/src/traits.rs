//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.

use async_trait::async_trait;
use uuid::Uuid;

use crate::ballot::CastResult;
use crate::models::{Bid, Meme, RealtimeEvent, VoteDirection};

/// Persistence contract for the `memes` table.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MemeRepo: Send + Sync {
    /// Inserts the row and returns it as stored.
    async fn insert_meme(&self, meme: Meme) -> anyhow::Result<Meme>;
    async fn get_meme(&self, id: Uuid) -> anyhow::Result<Option<Meme>>;
    /// All memes, newest first.
    async fn list_memes(&self) -> anyhow::Result<Vec<Meme>>;
    /// At most `limit` memes ordered by upvotes descending.
    async fn top_memes(&self, limit: i64) -> anyhow::Result<Vec<Meme>>;

    async fn update_caption(&self, id: Uuid, caption: &str) -> anyhow::Result<Option<Meme>>;
}

/// Persistence contract for the `votes` table, keyed by (meme, voter).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait VoteRepo: Send + Sync {
    /// Applies one cast atomically with respect to every other cast on the
    /// same meme: reads the standing vote and the counter, runs
    /// [`plan`](crate::ballot::plan), then writes the vote row and counter
    /// together. Returns `None`, touching nothing, when the meme does not exist.
    async fn cast(
        &self,
        meme_id: Uuid,
        user_id: &str,
        direction: VoteDirection,
    ) -> anyhow::Result<Option<CastResult>>;
}

/// Persistence contract for the append-only `bids` table.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait BidRepo: Send + Sync {
    async fn insert_bid(&self, bid: Bid) -> anyhow::Result<Bid>;
    /// Bids on any of the given memes, oldest first.
    async fn bids_for_memes(&self, meme_ids: &[Uuid]) -> anyhow::Result<Vec<Bid>>;
}

/// External generative text service.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Fire-and-forget fan-out to every connected viewer.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait Notifier: Send + Sync {
    fn broadcast(&self, event: RealtimeEvent);
}
