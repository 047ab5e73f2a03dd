//! # mh-configs
//!
//! Layered settings: built-in defaults, then `config/default.*` and
//! `config/local.*` if present, then `MEMEHUSTLE__SECTION__KEY` environment
//! variables. `PORT`, `DATABASE_URL` and `GEMINI_API_KEY` are honored last.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File};
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub ai: AiSettings,
    pub leaderboard: LeaderboardSettings,
    pub realtime: RealtimeSettings,
    pub log: LogSettings,
    /// The `.env` file that was loaded, if any.
    #[serde(skip)]
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    /// Postgres connection string. Absent means the in-memory store.
    pub url: Option<SecretString>,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize)]
pub struct AiSettings {
    /// Absent means every generation falls back to canned text.
    pub api_key: Option<SecretString>,
    pub model: String,
    pub endpoint: String,
    pub cache_capacity: usize,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardSettings {
    pub ttl_secs: u64,
    pub ceiling: i64,
    pub default_top: usize,
}

#[derive(Debug, Deserialize)]
pub struct RealtimeSettings {
    pub channel_capacity: usize,
}

#[derive(Debug, Deserialize)]
pub struct LogSettings {
    /// Used when `RUST_LOG` is unset.
    pub filter: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

impl Settings {
    /// Loads `.env`, then every configuration layer.
    pub fn load() -> Result<Self> {
        let env_file = dotenvy::dotenv().ok();

        let port = std::env::var("PORT")
            .ok()
            .map(|p| {
                p.parse::<i64>()
                    .map_err(|_| ConfigError::Invalid(format!("PORT is not a number: {p:?}")))
            })
            .transpose()?;

        let builder = Self::defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("MEMEHUSTLE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.port", port)?
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("ai.api_key", std::env::var("GEMINI_API_KEY").ok())?;

        Ok(Self {
            env_file,
            ..Self::from_builder(builder)?
        })
    }

    /// The built-in default layer.
    pub fn defaults() -> Result<ConfigBuilder<DefaultState>> {
        Ok(config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 5000)?
            .set_default("database.max_connections", 10)?
            .set_default("ai.model", "gemini-2.0-flash-exp")?
            .set_default("ai.endpoint", "https://generativelanguage.googleapis.com/v1beta")?
            .set_default("ai.cache_capacity", 1024)?
            .set_default("leaderboard.ttl_secs", 30)?
            .set_default("leaderboard.ceiling", 50)?
            .set_default("leaderboard.default_top", 10)?
            .set_default("realtime.channel_capacity", 256)?
            .set_default(
                "log.filter",
                "info,memehustle=debug,mh_services=debug,mh_api=debug,tower_http=info",
            )?
            .set_default("log.format", "pretty")?)
    }

    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        let checks = [
            (self.server.port == 0, "server.port must be non-zero"),
            (self.database.max_connections == 0, "database.max_connections must be positive"),
            (self.ai.cache_capacity == 0, "ai.cache_capacity must be positive"),
            (self.leaderboard.ttl_secs == 0, "leaderboard.ttl_secs must be positive"),
            (self.leaderboard.ceiling < 1, "leaderboard.ceiling must be positive"),
            (self.leaderboard.default_top == 0, "leaderboard.default_top must be positive"),
            (self.realtime.channel_capacity == 0, "realtime.channel_capacity must be positive"),
        ];
        match checks.iter().find(|(failed, _)| *failed) {
            Some((_, msg)) => Err(ConfigError::Invalid((*msg).to_string())),
            None => Ok(()),
        }
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("server address: {e}")))
    }
}

impl LeaderboardSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}
