//! # mh-db-postgres Implementation
//!
//! This module implements the data mapping between the Postgres relational
//! model and the `mh-core` domain models.

use anyhow::Context;
use async_trait::async_trait;
use mh_core::ballot::{plan, CastResult, VoteAction};
use mh_core::models::{Bid, Meme, Vote, VoteDirection};
use mh_core::traits::{BidRepo, MemeRepo, VoteRepo};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::info;
use uuid::Uuid;

const MEME_COLUMNS: &str =
    "id, title, image_url, tags, owner_id, upvotes, caption, vibe, created_at";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connects and brings the schema up to date.
    pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .context("connecting to Postgres")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("running migrations")?;
        info!("Postgres store ready");

        Ok(Self { pool })
    }
}

fn meme_from_row(row: &PgRow) -> Result<Meme, sqlx::Error> {
    Ok(Meme {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        image_url: row.try_get("image_url")?,
        tags: row.try_get("tags")?,
        owner_id: row.try_get("owner_id")?,
        upvotes: row.try_get("upvotes")?,
        caption: row.try_get("caption")?,
        vibe: row.try_get("vibe")?,
        created_at: row.try_get("created_at")?,
    })
}

fn bid_from_row(row: &PgRow) -> Result<Bid, sqlx::Error> {
    Ok(Bid {
        id: row.try_get("id")?,
        meme_id: row.try_get("meme_id")?,
        user_id: row.try_get("user_id")?,
        credits: row.try_get("credits")?,
        created_at: row.try_get("created_at")?,
    })
}

fn vote_from_row(row: &PgRow, meme_id: Uuid, user_id: &str) -> anyhow::Result<Vote> {
    let raw: String = row.try_get("vote_type")?;
    Ok(Vote {
        meme_id,
        user_id: user_id.to_string(),
        direction: direction_from_db(&raw)?,
        applied: row.try_get("applied")?,
    })
}

fn direction_from_db(raw: &str) -> anyhow::Result<VoteDirection> {
    raw.parse()
        .map_err(|_| anyhow::anyhow!("unexpected vote_type {raw:?} in votes table"))
}

#[async_trait]
impl MemeRepo for PgStore {
    async fn insert_meme(&self, meme: Meme) -> anyhow::Result<Meme> {
        let row = sqlx::query(&format!(
            "INSERT INTO memes ({MEME_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {MEME_COLUMNS}"
        ))
        .bind(meme.id)
        .bind(&meme.title)
        .bind(&meme.image_url)
        .bind(&meme.tags)
        .bind(&meme.owner_id)
        .bind(meme.upvotes)
        .bind(&meme.caption)
        .bind(&meme.vibe)
        .bind(meme.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(meme_from_row(&row)?)
    }

    async fn get_meme(&self, id: Uuid) -> anyhow::Result<Option<Meme>> {
        let row = sqlx::query(&format!("SELECT {MEME_COLUMNS} FROM memes WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(meme_from_row).transpose()?)
    }

    async fn list_memes(&self) -> anyhow::Result<Vec<Meme>> {
        let rows = sqlx::query(&format!(
            "SELECT {MEME_COLUMNS} FROM memes ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(meme_from_row).collect::<Result<_, _>>()?)
    }

    async fn top_memes(&self, limit: i64) -> anyhow::Result<Vec<Meme>> {
        let rows = sqlx::query(&format!(
            "SELECT {MEME_COLUMNS} FROM memes ORDER BY upvotes DESC, created_at ASC, id ASC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(meme_from_row).collect::<Result<_, _>>()?)
    }

    async fn update_caption(&self, id: Uuid, caption: &str) -> anyhow::Result<Option<Meme>> {
        let row = sqlx::query(&format!(
            "UPDATE memes SET caption = $2 WHERE id = $1 RETURNING {MEME_COLUMNS}"
        ))
        .bind(id)
        .bind(caption)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(meme_from_row).transpose()?)
    }
}

#[async_trait]
impl VoteRepo for PgStore {
    /// One transaction. The meme row lock serializes casts on the same meme,
    /// so the standing vote read below is the one this cast replaces.
    async fn cast(
        &self,
        meme_id: Uuid,
        user_id: &str,
        direction: VoteDirection,
    ) -> anyhow::Result<Option<CastResult>> {
        let mut tx = self.pool.begin().await?;

        let Some(locked) = sqlx::query("SELECT upvotes FROM memes WHERE id = $1 FOR UPDATE")
            .bind(meme_id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };
        let upvotes: i64 = locked.try_get("upvotes")?;

        let existing = sqlx::query(
            "SELECT vote_type, applied FROM votes WHERE meme_id = $1 AND user_id = $2",
        )
        .bind(meme_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .map(|row| vote_from_row(&row, meme_id, user_id))
        .transpose()?;

        let transition = plan(existing.as_ref(), direction, upvotes);
        match (transition.action, transition.vote_row(meme_id, user_id)) {
            (VoteAction::Insert, Some(vote)) => {
                sqlx::query(
                    "INSERT INTO votes (meme_id, user_id, vote_type, applied) VALUES ($1, $2, $3, $4)",
                )
                .bind(vote.meme_id)
                .bind(&vote.user_id)
                .bind(vote.direction.as_str())
                .bind(vote.applied)
                .execute(&mut *tx)
                .await?;
            }
            (VoteAction::Switch, Some(vote)) => {
                sqlx::query(
                    "UPDATE votes SET vote_type = $3, applied = $4 WHERE meme_id = $1 AND user_id = $2",
                )
                .bind(vote.meme_id)
                .bind(&vote.user_id)
                .bind(vote.direction.as_str())
                .bind(vote.applied)
                .execute(&mut *tx)
                .await?;
            }
            _ => {
                sqlx::query("DELETE FROM votes WHERE meme_id = $1 AND user_id = $2")
                    .bind(meme_id)
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        let row = sqlx::query(&format!(
            "UPDATE memes SET upvotes = $2 WHERE id = $1 RETURNING {MEME_COLUMNS}"
        ))
        .bind(meme_id)
        .bind(transition.upvotes)
        .fetch_one(&mut *tx)
        .await?;
        let meme = meme_from_row(&row)?;

        tx.commit().await.context("committing vote")?;
        Ok(Some(CastResult { meme, transition }))
    }
}

#[async_trait]
impl BidRepo for PgStore {
    async fn insert_bid(&self, bid: Bid) -> anyhow::Result<Bid> {
        let row = sqlx::query(
            "INSERT INTO bids (id, meme_id, user_id, credits, created_at) VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, meme_id, user_id, credits, created_at",
        )
        .bind(bid.id)
        .bind(bid.meme_id)
        .bind(&bid.user_id)
        .bind(bid.credits)
        .bind(bid.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(bid_from_row(&row)?)
    }

    async fn bids_for_memes(&self, meme_ids: &[Uuid]) -> anyhow::Result<Vec<Bid>> {
        let rows = sqlx::query(
            "SELECT id, meme_id, user_id, credits, created_at FROM bids \
             WHERE meme_id = ANY($1) ORDER BY created_at ASC, id ASC",
        )
        .bind(meme_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(bid_from_row).collect::<Result<_, _>>()?)
    }
}
