//! # Vote Ledger
//!
//! One standing vote per (meme, voter). Casting the same direction again
//! removes the vote; casting the opposite direction flips it in place. Only
//! the marginal change is applied to the meme's upvote counter, and the
//! whole cast is committed by the store as one step.

use std::sync::Arc;

use mh_core::{
    AppError, Meme, Notifier, RealtimeEvent, Result, VoteAction, VoteDirection, VoteRepo,
};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct VoteOutcome {
    pub meme: Meme,
    pub user_vote: Option<VoteDirection>,
    /// True when the cast toggled an existing vote off.
    pub removed: bool,
}

pub struct VoteLedger {
    votes: Arc<dyn VoteRepo>,
    notifier: Arc<dyn Notifier>,
}

impl VoteLedger {
    pub fn new(votes: Arc<dyn VoteRepo>, notifier: Arc<dyn Notifier>) -> Self {
        Self { votes, notifier }
    }

    pub async fn cast_vote(
        &self,
        meme_id: Uuid,
        voter_id: &str,
        direction: VoteDirection,
    ) -> Result<VoteOutcome> {
        let voter_id = voter_id.trim();
        if voter_id.is_empty() {
            return Err(AppError::ValidationError("user_id is required".into()));
        }

        let cast = self
            .votes
            .cast(meme_id, voter_id, direction)
            .await?
            .ok_or_else(|| AppError::meme_not_found(meme_id))?;
        let step = cast.transition;

        info!(
            meme_id = %meme_id,
            voter = %voter_id,
            action = ?step.action,
            delta = step.delta,
            upvotes = cast.meme.upvotes,
            "Vote recorded"
        );

        self.notifier.broadcast(RealtimeEvent::VoteUpdate {
            meme_id,
            upvotes: cast.meme.upvotes,
            user_vote: step.resulting,
        });

        Ok(VoteOutcome {
            meme: cast.meme,
            user_vote: step.resulting,
            removed: step.action == VoteAction::Remove,
        })
    }
}
