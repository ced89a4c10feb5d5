//! Stage-output cache behind an explicit interface.
//!
//! The pipeline memoizes its retrieval stage: the merged evidence for a
//! normalized (query, intent, filters, grounding mode) tuple is reusable
//! across requests until it goes stale. Synthesis output is not cached
//! because it depends on conversation context.

use grounder_retrieval::{Filters, GroundingMode, Intent};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Cache contract.
#[async_trait::async_trait]
pub trait Cache: Send + Sync {
    /// Fetch a live entry, or `None` on miss/expiry.
    async fn get(&self, key: &str) -> Option<Value>;

    /// Store an entry with a time-to-live.
    async fn put(&self, key: &str, value: Value, ttl: Duration);
}

/// Cache key for the retrieval stage.
///
/// Derived from normalized inputs so unrelated requests never contend on
/// the same key.
pub fn retrieval_cache_key(
    normalized_query: &str,
    intent: Intent,
    filters: &Filters,
    mode: GroundingMode,
) -> String {
    format!(
        "retrieval:{}:{}:{}:{}",
        intent,
        mode,
        filters.canonical(),
        normalized_query
    )
}

/// In-memory TTL cache.
#[derive(Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, (Instant, Value)>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Cache for InMemoryCache {
    async fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(key) {
            Some((expires_at, value)) if *expires_at > Instant::now() => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    async fn put(&self, key: &str, value: Value, ttl: Duration) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), (Instant::now() + ttl, value));
        }
    }
}
