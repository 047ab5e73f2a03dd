//! # mh-services
//!
//! The marketplace components, written against the `mh-core` ports.

pub mod bids;
pub mod captions;
pub mod leaderboard;
pub mod memes;
pub mod votes;

pub use bids::{highest_bid, BidRecorder};
pub use captions::CaptionGenerator;
pub use leaderboard::{coerce_limit, LeaderboardCache};
pub use memes::{MemeCatalog, NewMeme};
pub use votes::{VoteLedger, VoteOutcome};
