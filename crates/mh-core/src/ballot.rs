//! # Ballot arithmetic
//!
//! One standing vote per (meme, voter). Casting the same direction again
//! removes the vote; casting the opposite direction flips it in place and
//! moves the counter by a single unit. The counter never drops below 0.
//!
//! Every vote row remembers the counter change its last cast actually made,
//! so removing it undoes exactly that change, even when the floor swallowed
//! part of the unit. Stores run [`plan`] inside whatever makes a cast atomic
//! for them (a row lock, an entry lock).

use uuid::Uuid;

use crate::models::{Meme, Vote, VoteDirection};

/// What happens to the vote row when a direction is cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteAction {
    Insert,
    Remove,
    Switch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub action: VoteAction,
    /// Change applied to the counter, after the floor.
    pub delta: i64,
    /// Counter value once the cast is applied.
    pub upvotes: i64,
    /// The voter's direction after the cast.
    pub resulting: Option<VoteDirection>,
}

/// Plans casting `cast` over the voter's `existing` vote on a meme that
/// currently has `upvotes`.
pub fn plan(existing: Option<&Vote>, cast: VoteDirection, upvotes: i64) -> Transition {
    let (action, requested, resulting) = match existing {
        None => (VoteAction::Insert, cast.unit(), Some(cast)),
        Some(vote) if vote.direction == cast => (VoteAction::Remove, -vote.applied, None),
        Some(_) => (VoteAction::Switch, cast.unit(), Some(cast)),
    };

    let after = (upvotes + requested).max(0);
    Transition {
        action,
        delta: after - upvotes,
        upvotes: after,
        resulting,
    }
}

impl Transition {
    /// The vote row to keep after this transition, if any.
    pub fn vote_row(&self, meme_id: Uuid, user_id: &str) -> Option<Vote> {
        self.resulting.map(|direction| Vote {
            meme_id,
            user_id: user_id.to_string(),
            direction,
            applied: self.delta,
        })
    }
}

/// A cast as committed by a store.
#[derive(Debug, Clone, PartialEq)]
pub struct CastResult {
    pub meme: Meme,
    pub transition: Transition,
}
