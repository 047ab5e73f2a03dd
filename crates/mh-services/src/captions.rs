//! # Caption / Vibe Generator
//!
//! Memoizes generated captions and vibes per tag set. Generation faults
//! never reach the caller: a canned line from the matching pool is served
//! instead and nothing is memoized, so the next call retries the model.

use std::collections::HashMap;
use std::sync::Arc;

use mh_core::{AppError, TextGenerator};
use rand::seq::SliceRandom;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

pub const CAPTION_FALLBACKS: [&str; 6] = [
    "YOLO to the moon! 🚀",
    "Much wow, very cyber",
    "Stonks go brrr in the matrix",
    "HODL the neon vibes!",
    "This is the way... to meme",
    "Number go up, brain go brrr",
];

pub const VIBE_FALLBACKS: [&str; 6] = [
    "Neon Crypto Chaos",
    "Retro Stonks Vibes",
    "Digital Doge Energy",
    "Synthwave Meme Magic",
    "Cyberpunk HODL Mood",
    "Matrix Meme Vibes",
];

pub fn caption_key(tags: &[String]) -> String {
    format!("caption_{}", tags.join("_"))
}

pub fn vibe_key(tags: &[String], title: &str) -> String {
    format!("vibe_{}_{}", tags.join("_"), title)
}

fn caption_prompt(tags: &[String]) -> String {
    format!(
        "Generate a funny, cyberpunk-style caption for a meme with tags: {}. \
         Make it short, witty, and internet culture savvy. \
         Examples: \"Doge hacks the matrix\", \"HODL to the neon moon\", \
         \"Stonks go brrr in cyberspace\"",
        tags.join(", ")
    )
}

fn vibe_prompt(tags: &[String], title: &str) -> String {
    format!(
        "Describe the vibe of a meme titled \"{}\" with tags: {}. \
         Use cyberpunk, neon, futuristic language. Keep it 2-4 words. \
         Examples: \"Neon Crypto Chaos\", \"Retro Stonks Vibes\", \"Digital Doge Energy\"",
        title,
        tags.join(", ")
    )
}

/// Fixed-capacity memo with least-recently-used eviction.
struct LruMemo {
    capacity: usize,
    tick: u64,
    entries: HashMap<String, (String, u64)>,
}

impl LruMemo {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            tick: 0,
            entries: HashMap::new(),
        }
    }

    fn get(&mut self, key: &str) -> Option<String> {
        self.tick += 1;
        let tick = self.tick;
        self.entries.get_mut(key).map(|(value, used)| {
            *used = tick;
            value.clone()
        })
    }

    fn insert(&mut self, key: String, value: String) {
        self.tick += 1;
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, (_, used))| *used)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                self.entries.remove(&oldest);
            }
        }
        self.entries.insert(key, (value, self.tick));
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

pub struct CaptionGenerator {
    model: Arc<dyn TextGenerator>,
    memo: Mutex<LruMemo>,
}

impl CaptionGenerator {
    pub fn new(model: Arc<dyn TextGenerator>, capacity: usize) -> Self {
        Self {
            model,
            memo: Mutex::new(LruMemo::new(capacity)),
        }
    }

    pub async fn caption(&self, tags: &[String]) -> String {
        self.generate(caption_key(tags), caption_prompt(tags), &CAPTION_FALLBACKS)
            .await
    }

    pub async fn vibe(&self, tags: &[String], title: &str) -> String {
        self.generate(vibe_key(tags, title), vibe_prompt(tags, title), &VIBE_FALLBACKS)
            .await
    }

    /// Number of memoized entries.
    pub async fn cached(&self) -> usize {
        self.memo.lock().await.len()
    }

    async fn generate(&self, key: String, prompt: String, fallbacks: &[&str]) -> String {
        if let Some(hit) = self.memo.lock().await.get(&key) {
            debug!(key = %key, "AI cache hit");
            return hit;
        }

        match self.request(&prompt).await {
            Ok(text) => {
                self.memo.lock().await.insert(key, text.clone());
                text
            }
            Err(err) => {
                warn!(key = %key, error = %err, "Text generation failed, serving fallback");
                pick_fallback(fallbacks)
            }
        }
    }

    async fn request(&self, prompt: &str) -> Result<String, AppError> {
        let raw = self
            .model
            .generate(prompt)
            .await
            .map_err(|e| AppError::GenerationFault(format!("{e:#}")))?;
        let text = raw.trim();
        if text.is_empty() {
            return Err(AppError::GenerationFault("empty response".into()));
        }
        Ok(text.to_string())
    }
}

fn pick_fallback(pool: &[&str]) -> String {
    pool.choose(&mut rand::thread_rng())
        .map(|s| s.to_string())
        .unwrap_or_default()
}
