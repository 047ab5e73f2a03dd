//! # mh-db-memory
//!
//! In-process implementation of the repo ports. Nothing survives a restart;
//! used for local runs without a database and as the store in tests.

use std::cmp::Reverse;

use anyhow::bail;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use mh_core::ballot::{plan, CastResult};
use mh_core::models::{Bid, Meme, Vote, VoteDirection};
use mh_core::traits::{BidRepo, MemeRepo, VoteRepo};
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryStore {
    memes: DashMap<Uuid, Meme>,
    /// Keyed by (meme, voter): the map itself enforces one vote per pair.
    votes: DashMap<(Uuid, String), Vote>,
    /// Bids per meme in insertion order.
    bids: DashMap<Uuid, Vec<Bid>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of standing votes on a meme.
    pub fn vote_count(&self, meme_id: Uuid) -> usize {
        self.votes.iter().filter(|e| e.key().0 == meme_id).count()
    }

    /// The voter's standing vote on a meme.
    pub fn vote_of(&self, meme_id: Uuid, user_id: &str) -> Option<Vote> {
        self.votes
            .get(&(meme_id, user_id.to_string()))
            .map(|v| v.value().clone())
    }

    /// Overwrites a meme's counter directly, bypassing the vote ledger.
    pub fn set_upvotes(&self, id: Uuid, upvotes: i64) -> bool {
        match self.memes.get_mut(&id) {
            Some(mut meme) => {
                meme.upvotes = upvotes.max(0);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl MemeRepo for MemoryStore {
    async fn insert_meme(&self, meme: Meme) -> anyhow::Result<Meme> {
        match self.memes.entry(meme.id) {
            Entry::Occupied(_) => bail!("meme {} already exists", meme.id),
            Entry::Vacant(slot) => Ok(slot.insert(meme).value().clone()),
        }
    }

    async fn get_meme(&self, id: Uuid) -> anyhow::Result<Option<Meme>> {
        Ok(self.memes.get(&id).map(|m| m.value().clone()))
    }

    async fn list_memes(&self) -> anyhow::Result<Vec<Meme>> {
        let mut memes: Vec<Meme> = self.memes.iter().map(|m| m.value().clone()).collect();
        memes.sort_by_key(|m| Reverse((m.created_at, m.id)));
        Ok(memes)
    }

    async fn top_memes(&self, limit: i64) -> anyhow::Result<Vec<Meme>> {
        let mut memes: Vec<Meme> = self.memes.iter().map(|m| m.value().clone()).collect();
        memes.sort_by_key(|m| (Reverse(m.upvotes), m.created_at, m.id));
        memes.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(memes)
    }

    async fn update_caption(&self, id: Uuid, caption: &str) -> anyhow::Result<Option<Meme>> {
        Ok(self.memes.get_mut(&id).map(|mut meme| {
            meme.caption = caption.to_string();
            meme.clone()
        }))
    }
}

#[async_trait]
impl VoteRepo for MemoryStore {
    async fn cast(
        &self,
        meme_id: Uuid,
        user_id: &str,
        direction: VoteDirection,
    ) -> anyhow::Result<Option<CastResult>> {
        // Held until the cast is committed: serializes every cast on this meme.
        // Lock order is always memes, then votes.
        let Some(mut meme) = self.memes.get_mut(&meme_id) else {
            return Ok(None);
        };

        let key = (meme_id, user_id.to_string());
        let existing = self.votes.get(&key).map(|v| v.value().clone());
        let transition = plan(existing.as_ref(), direction, meme.upvotes);

        match transition.vote_row(meme_id, user_id) {
            Some(vote) => {
                self.votes.insert(key, vote);
            }
            None => {
                self.votes.remove(&key);
            }
        }
        meme.upvotes = transition.upvotes;

        Ok(Some(CastResult {
            meme: meme.value().clone(),
            transition,
        }))
    }
}

#[async_trait]
impl BidRepo for MemoryStore {
    async fn insert_bid(&self, bid: Bid) -> anyhow::Result<Bid> {
        if !self.memes.contains_key(&bid.meme_id) {
            bail!("bid references unknown meme {}", bid.meme_id);
        }
        self.bids.entry(bid.meme_id).or_default().push(bid.clone());
        Ok(bid)
    }

    async fn bids_for_memes(&self, meme_ids: &[Uuid]) -> anyhow::Result<Vec<Bid>> {
        let mut bids: Vec<Bid> = meme_ids
            .iter()
            .filter_map(|id| self.bids.get(id).map(|b| b.value().clone()))
            .flatten()
            .collect();
        // Stable: same-instant bids keep insertion order.
        bids.sort_by_key(|b| b.created_at);
        Ok(bids)
    }
}
