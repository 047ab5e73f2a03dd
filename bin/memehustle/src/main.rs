//! # MemeHustle Binary
//!
//! Assembles the application from configuration and the compiled-in plugins.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use mh_api::{AppState, Ports, Tuning};
use mh_configs::{LogFormat, Settings};
use mh_core::{BidRepo, MemeRepo, TextGenerator, VoteRepo};
use mh_db_memory::MemoryStore;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "db-postgres")]
use mh_db_postgres::PgStore;

#[cfg(feature = "ai-gemini")]
use mh_ai_gemini::GeminiClient;

/// Generator used when no AI backend is available. Every call fails, so
/// captions and vibes come from the fallback pools.
struct OfflineGenerator;

#[async_trait]
impl TextGenerator for OfflineGenerator {
    async fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
        anyhow::bail!("text generation is not configured")
    }
}

type Stores = (Arc<dyn MemeRepo>, Arc<dyn VoteRepo>, Arc<dyn BidRepo>);

fn init_tracing(settings: &Settings) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log.filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match settings.log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}

fn memory_stores() -> Stores {
    let store = Arc::new(MemoryStore::new());
    (store.clone(), store.clone(), store)
}

async fn open_stores(settings: &Settings) -> anyhow::Result<Stores> {
    #[cfg(feature = "db-postgres")]
    if let Some(url) = &settings.database.url {
        use secrecy::ExposeSecret;

        let store = Arc::new(
            PgStore::connect(url.expose_secret(), settings.database.max_connections)
                .await
                .context("connecting to Postgres")?,
        );
        return Ok((store.clone(), store.clone(), store));
    }

    warn!(
        configured = settings.database.url.is_some(),
        "No database in use, state lives in memory and is lost on exit"
    );
    Ok(memory_stores())
}

fn text_generator(settings: &Settings) -> Arc<dyn TextGenerator> {
    #[cfg(feature = "ai-gemini")]
    if let Some(key) = &settings.ai.api_key {
        use secrecy::{ExposeSecret, SecretString};

        info!(model = %settings.ai.model, "Using Gemini for captions");
        return Arc::new(GeminiClient::new(
            &settings.ai.endpoint,
            &settings.ai.model,
            SecretString::from(key.expose_secret().to_string()),
        ));
    }

    warn!(
        configured = settings.ai.api_key.is_some(),
        "No AI backend in use, serving fallback captions"
    );
    Arc::new(OfflineGenerator)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("loading configuration")?;
    init_tracing(&settings);
    if let Some(path) = &settings.env_file {
        debug!(path = %path.display(), "Loaded .env");
    }

    let (memes, votes, bids) = open_stores(&settings).await?;
    let generator = text_generator(&settings);

    let state = AppState::assemble(
        Ports {
            memes,
            votes,
            bids,
            generator,
        },
        Tuning {
            leaderboard_ttl: settings.leaderboard.ttl(),
            leaderboard_ceiling: settings.leaderboard.ceiling,
            default_top: settings.leaderboard.default_top,
            ai_cache_capacity: settings.ai.cache_capacity,
            channel_capacity: settings.realtime.channel_capacity,
        },
    );

    let addr = settings.listen_addr()?;
    info!(%addr, version = env!("CARGO_PKG_VERSION"), "MemeHustle starting");
    mh_api::serve(state, addr).await
}
