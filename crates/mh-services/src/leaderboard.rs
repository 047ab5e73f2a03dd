//! # Leaderboard Cache
//!
//! A single time-windowed snapshot of the top memes by upvotes. Writes do
//! not invalidate it; readers see at most `ttl` of staleness.

use std::sync::Arc;
use std::time::Duration;

use mh_core::{Meme, MemeRepo, Result};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

pub const DEFAULT_TTL: Duration = Duration::from_secs(30);
pub const DEFAULT_CEILING: i64 = 50;
pub const DEFAULT_TOP: usize = 10;

struct Snapshot {
    memes: Arc<Vec<Meme>>,
    expires_at: Instant,
}

pub struct LeaderboardCache {
    memes: Arc<dyn MemeRepo>,
    ttl: Duration,
    /// Rows fetched per refresh; larger than typical requests.
    ceiling: i64,
    snapshot: RwLock<Option<Snapshot>>,
}

impl LeaderboardCache {
    pub fn new(memes: Arc<dyn MemeRepo>, ttl: Duration, ceiling: i64) -> Self {
        Self {
            memes,
            ttl,
            ceiling: ceiling.max(1),
            snapshot: RwLock::new(None),
        }
    }

    /// Returns the first `limit` entries of the ranked snapshot, refreshing
    /// it first when it is missing or expired.
    pub async fn get(&self, limit: usize) -> Result<Vec<Meme>> {
        let limit = limit.max(1);

        if let Some(memes) = self.current().await {
            return Ok(take(&memes, limit));
        }

        // Concurrent expiries may each refresh; the last write wins.
        let fresh = Arc::new(self.memes.top_memes(self.ceiling).await?);
        debug!(rows = fresh.len(), "Leaderboard snapshot refreshed");

        *self.snapshot.write().await = Some(Snapshot {
            memes: fresh.clone(),
            expires_at: Instant::now() + self.ttl,
        });

        Ok(take(&fresh, limit))
    }

    async fn current(&self) -> Option<Arc<Vec<Meme>>> {
        let guard = self.snapshot.read().await;
        guard
            .as_ref()
            .filter(|s| Instant::now() < s.expires_at)
            .map(|s| s.memes.clone())
    }
}

fn take(memes: &[Meme], limit: usize) -> Vec<Meme> {
    memes.iter().take(limit).cloned().collect()
}

/// Coerces a raw `top` query value into a positive limit.
///
/// Missing or non-numeric values use `default`; fractions truncate; anything
/// below 1 becomes 1.
pub fn coerce_limit(raw: Option<&str>, default: usize) -> usize {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return default.max(1);
    };

    let parsed = raw
        .parse::<i64>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64));

    match parsed {
        Some(n) if n < 1 => 1,
        Some(n) => usize::try_from(n).unwrap_or(usize::MAX),
        None => default.max(1),
    }
}
