//! # Bid Recorder
//!
//! Bids are append-only. The high bid of a meme is derived on read.

use std::sync::Arc;

use chrono::Utc;
use mh_core::{AppError, Bid, BidRepo, MemeRepo, Notifier, RealtimeEvent, Result};
use tracing::info;
use uuid::Uuid;

pub struct BidRecorder {
    memes: Arc<dyn MemeRepo>,
    bids: Arc<dyn BidRepo>,
    notifier: Arc<dyn Notifier>,
}

impl BidRecorder {
    pub fn new(
        memes: Arc<dyn MemeRepo>,
        bids: Arc<dyn BidRepo>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self { memes, bids, notifier }
    }

    pub async fn place_bid(&self, meme_id: Uuid, bidder_id: &str, credits: i64) -> Result<Bid> {
        if credits <= 0 {
            return Err(AppError::InvalidAmount(credits));
        }
        let bidder_id = bidder_id.trim();
        if bidder_id.is_empty() {
            return Err(AppError::ValidationError("user_id is required".into()));
        }

        if self.memes.get_meme(meme_id).await?.is_none() {
            return Err(AppError::meme_not_found(meme_id));
        }

        let bid = self
            .bids
            .insert_bid(Bid {
                id: Uuid::now_v7(),
                meme_id,
                user_id: bidder_id.to_string(),
                credits,
                created_at: Utc::now(),
            })
            .await?;

        info!(meme_id = %meme_id, bidder = %bid.user_id, credits, "Bid placed");

        self.notifier.broadcast(RealtimeEvent::BidUpdate {
            meme_id,
            credits: bid.credits,
            user_id: bid.user_id.clone(),
        });

        Ok(bid)
    }
}

/// The bid of record: highest credits, earliest placed among ties.
///
/// Bids created at the same instant keep their slice order.
pub fn highest_bid(bids: &[Bid]) -> Option<&Bid> {
    bids.iter().reduce(|best, bid| {
        let outbids = bid.credits > best.credits
            || (bid.credits == best.credits && bid.created_at < best.created_at);
        if outbids {
            bid
        } else {
            best
        }
    })
}
