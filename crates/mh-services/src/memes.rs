//! # Meme Catalog
//!
//! Listing, creation, and caption refresh. Listings carry the derived
//! high bid of each meme.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use mh_core::{
    AppError, Bid, BidRepo, Meme, MemeListing, MemeRepo, Notifier, RealtimeEvent, Result,
};
use tracing::info;
use uuid::Uuid;

use crate::bids::highest_bid;
use crate::captions::CaptionGenerator;

/// Input for a new listing. `owner_id` is the caller's identity.
#[derive(Debug, Clone, Default)]
pub struct NewMeme {
    pub title: String,
    pub image_url: Option<String>,
    pub tags: Vec<String>,
    pub owner_id: String,
}

pub struct MemeCatalog {
    memes: Arc<dyn MemeRepo>,
    bids: Arc<dyn BidRepo>,
    captions: Arc<CaptionGenerator>,
    notifier: Arc<dyn Notifier>,
}

impl MemeCatalog {
    pub fn new(
        memes: Arc<dyn MemeRepo>,
        bids: Arc<dyn BidRepo>,
        captions: Arc<CaptionGenerator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self { memes, bids, captions, notifier }
    }

    /// All memes, newest first, each with its bid of record.
    pub async fn list(&self) -> Result<Vec<MemeListing>> {
        let memes = self.memes.list_memes().await?;
        if memes.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = memes.iter().map(|m| m.id).collect();
        let mut by_meme: HashMap<Uuid, Vec<Bid>> = HashMap::new();
        for bid in self.bids.bids_for_memes(&ids).await? {
            by_meme.entry(bid.meme_id).or_default().push(bid);
        }

        Ok(memes
            .into_iter()
            .map(|meme| {
                let top = by_meme.get(&meme.id).and_then(|bids| highest_bid(bids));
                MemeListing {
                    highest_bid: top.map_or(0, |b| b.credits),
                    highest_bidder: top.map(|b| b.user_id.clone()),
                    meme,
                }
            })
            .collect())
    }

    pub async fn create(&self, req: NewMeme) -> Result<Meme> {
        let title = req.title.trim();
        if title.is_empty() {
            return Err(AppError::ValidationError("title is required".into()));
        }
        let owner_id = req.owner_id.trim();
        if owner_id.is_empty() {
            return Err(AppError::ValidationError("owner_id is required".into()));
        }

        let tags: Vec<String> = req
            .tags
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();

        let now = Utc::now();
        let image_url = req
            .image_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| placeholder_image(now.timestamp_millis()));

        let caption = self.captions.caption(&tags).await;
        let vibe = self.captions.vibe(&tags, title).await;

        let meme = self
            .memes
            .insert_meme(Meme {
                id: Uuid::now_v7(),
                title: title.to_string(),
                image_url,
                tags,
                owner_id: owner_id.to_string(),
                upvotes: 0,
                caption,
                vibe,
                created_at: now,
            })
            .await?;

        info!(meme_id = %meme.id, owner = %meme.owner_id, "Meme created");
        self.notifier.broadcast(RealtimeEvent::MemeCreated(meme.clone()));

        Ok(meme)
    }

    /// Regenerates the caption of an existing meme from its tags.
    pub async fn refresh_caption(&self, id: Uuid) -> Result<Meme> {
        let meme = self
            .memes
            .get_meme(id)
            .await?
            .ok_or_else(|| AppError::meme_not_found(id))?;

        let caption = self.captions.caption(&meme.tags).await;

        let updated = self
            .memes
            .update_caption(id, &caption)
            .await?
            .ok_or_else(|| AppError::meme_not_found(id))?;

        info!(meme_id = %id, "Caption refreshed");
        Ok(updated)
    }
}

fn placeholder_image(seed: i64) -> String {
    format!("https://picsum.photos/400/400?random={seed}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captions::{DEFAULT_CACHE_CAPACITY, VIBE_FALLBACKS};
    use crate::test_support::meme_with_upvotes;
    use chrono::Duration;
    use mh_core::{MockBidRepo, MockMemeRepo, MockNotifier, MockTextGenerator};

    fn captions(model: MockTextGenerator) -> Arc<CaptionGenerator> {
        Arc::new(CaptionGenerator::new(Arc::new(model), DEFAULT_CACHE_CAPACITY))
    }

    fn bid(meme_id: Uuid, user: &str, credits: i64, offset_ms: i64) -> Bid {
        Bid {
            id: Uuid::now_v7(),
            meme_id,
            user_id: user.to_string(),
            credits,
            created_at: Utc::now() + Duration::milliseconds(offset_ms),
        }
    }

    #[tokio::test]
    async fn test_list_attaches_bid_of_record() {
        let with_bids = meme_with_upvotes(3);
        let without = meme_with_upvotes(1);
        let (a, b) = (with_bids.id, without.id);

        let mut memes = MockMemeRepo::new();
        let rows = vec![with_bids, without];
        memes.expect_list_memes().returning(move || Ok(rows.clone()));

        let mut bids = MockBidRepo::new();
        bids.expect_bids_for_memes()
            .withf(move |ids| ids == [a, b])
            .returning(move |_| {
                Ok(vec![
                    bid(a, "cyberpunk420", 10, 0),
                    bid(a, "neonhacker", 25, 10),
                    bid(a, "matrixdoge", 25, 20),
                ])
            });

        let catalog = MemeCatalog::new(
            Arc::new(memes),
            Arc::new(bids),
            captions(MockTextGenerator::new()),
            Arc::new(MockNotifier::new()),
        );

        let listing = catalog.list().await.unwrap();
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].highest_bid, 25);
        assert_eq!(listing[0].highest_bidder.as_deref(), Some("neonhacker"));
        assert_eq!(listing[1].meme.id, b);
        assert_eq!(listing[1].highest_bid, 0);
        assert_eq!(listing[1].highest_bidder, None);
    }

    #[tokio::test]
    async fn test_list_empty_skips_bid_query() {
        let mut memes = MockMemeRepo::new();
        memes.expect_list_memes().returning(|| Ok(Vec::new()));
        let mut bids = MockBidRepo::new();
        bids.expect_bids_for_memes().never();

        let catalog = MemeCatalog::new(
            Arc::new(memes),
            Arc::new(bids),
            captions(MockTextGenerator::new()),
            Arc::new(MockNotifier::new()),
        );
        assert!(catalog.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_generates_text_and_broadcasts() {
        let mut model = MockTextGenerator::new();
        model.expect_generate().returning(|prompt| {
            if prompt.starts_with("Describe") {
                Err(anyhow::anyhow!("network down"))
            } else {
                Ok("Doge hacks the matrix".to_string())
            }
        });

        let mut memes = MockMemeRepo::new();
        memes.expect_insert_meme().times(1).returning(|m| Ok(m));

        let mut notifier = MockNotifier::new();
        notifier
            .expect_broadcast()
            .withf(|e| matches!(e, RealtimeEvent::MemeCreated(m) if m.title == "Doge"))
            .times(1)
            .return_const(());

        let catalog = MemeCatalog::new(
            Arc::new(memes),
            Arc::new(MockBidRepo::new()),
            captions(model),
            Arc::new(notifier),
        );

        let meme = catalog
            .create(NewMeme {
                title: "  Doge ".into(),
                image_url: None,
                tags: vec!["crypto".into(), " ".into(), "doge".into()],
                owner_id: "cyberpunk420".into(),
            })
            .await
            .unwrap();

        assert_eq!(meme.title, "Doge");
        assert_eq!(meme.tags, vec!["crypto".to_string(), "doge".to_string()]);
        assert_eq!(meme.upvotes, 0);
        assert_eq!(meme.caption, "Doge hacks the matrix");
        assert!(VIBE_FALLBACKS.contains(&meme.vibe.as_str()));
        assert!(meme.image_url.starts_with("https://picsum.photos/400/400?random="));
    }

    #[tokio::test]
    async fn test_create_requires_title_and_owner() {
        let mut memes = MockMemeRepo::new();
        memes.expect_insert_meme().never();
        let catalog = MemeCatalog::new(
            Arc::new(memes),
            Arc::new(MockBidRepo::new()),
            captions(MockTextGenerator::new()),
            Arc::new(MockNotifier::new()),
        );

        let no_title = NewMeme {
            owner_id: "neonhacker".into(),
            ..Default::default()
        };
        assert!(matches!(
            catalog.create(no_title).await,
            Err(AppError::ValidationError(_))
        ));

        let no_owner = NewMeme {
            title: "Stonks".into(),
            ..Default::default()
        };
        assert!(matches!(
            catalog.create(no_owner).await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_refresh_caption_updates_row() {
        let meme = meme_with_upvotes(2);
        let id = meme.id;

        let mut model = MockTextGenerator::new();
        model
            .expect_generate()
            .returning(|_| Ok("HODL to the neon moon".to_string()));

        let mut memes = MockMemeRepo::new();
        let found = meme.clone();
        memes.expect_get_meme().returning(move |_| Ok(Some(found.clone())));
        memes
            .expect_update_caption()
            .withf(move |m, c| *m == id && c == "HODL to the neon moon")
            .times(1)
            .returning(move |_, c| {
                Ok(Some(Meme {
                    caption: c.to_string(),
                    ..meme.clone()
                }))
            });

        let catalog = MemeCatalog::new(
            Arc::new(memes),
            Arc::new(MockBidRepo::new()),
            captions(model),
            Arc::new(MockNotifier::new()),
        );
        let updated = catalog.refresh_caption(id).await.unwrap();
        assert_eq!(updated.caption, "HODL to the neon moon");
    }

    #[tokio::test]
    async fn test_refresh_caption_missing_meme() {
        let mut memes = MockMemeRepo::new();
        memes.expect_get_meme().returning(|_| Ok(None));
        let mut model = MockTextGenerator::new();
        model.expect_generate().never();

        let catalog = MemeCatalog::new(
            Arc::new(memes),
            Arc::new(MockBidRepo::new()),
            captions(model),
            Arc::new(MockNotifier::new()),
        );
        assert!(matches!(
            catalog.refresh_caption(Uuid::now_v7()).await,
            Err(AppError::NotFound(..))
        ));
    }
}
