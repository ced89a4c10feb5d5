//! Retrieval data model: intents, filters, chunks, and provider results.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Detected query intent.
///
/// Providers advertise which intents they can serve; the planner never
/// selects a provider for an intent outside its capability set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Shopping,
    Hotel,
    Flight,
    Movie,
    Place,
    Generic,
}

impl Intent {
    /// Stable string form, used in cache keys and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Shopping => "shopping",
            Intent::Hotel => "hotel",
            Intent::Flight => "flight",
            Intent::Movie => "movie",
            Intent::Place => "place",
            Intent::Generic => "generic",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much external evidence a query requires before synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroundingMode {
    /// Answerable from the model's own knowledge; no retrieval
    None,
    /// A single broad web lookup plus synthesis suffices
    Hybrid,
    /// Planned multi-provider retrieval
    Full,
}

impl GroundingMode {
    /// Stable string form, used in cache keys and answers.
    pub fn as_str(&self) -> &'static str {
        match self {
            GroundingMode::None => "none",
            GroundingMode::Hybrid => "hybrid",
            GroundingMode::Full => "full",
        }
    }

    /// Whether this mode requires retrieved evidence at all.
    pub fn requires_evidence(&self) -> bool {
        !matches!(self, GroundingMode::None)
    }
}

impl fmt::Display for GroundingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Well-known filter attribute names.
///
/// Filters are an open attribute→value map; these constants cover the
/// attributes the pipeline itself reads.
pub mod filter_keys {
    /// City/region the query is about
    pub const LOCATION: &str = "location";
    /// Upper price bound, numeric string
    pub const PRICE_MAX: &str = "price_max";
    /// Star-rating requirement (hotels)
    pub const STARS: &str = "stars";
    /// Brand token (shopping)
    pub const BRAND: &str = "brand";
    /// Travel dates, "YYYY-MM-DD/YYYY-MM-DD"
    pub const DATES: &str = "dates";
    /// Product/venue category
    pub const CATEGORY: &str = "category";
}

/// Extracted query filters: an ordered attribute→value mapping.
///
/// Backed by a `BTreeMap` so iteration order, and therefore the canonical
/// rendering used in cache keys, is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filters {
    values: BTreeMap<String, String>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute, replacing any existing value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Builder-style variant of [`Filters::set`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Inherit attributes from `other` without overwriting any attribute
    /// already present. Explicit mentions always win over inherited ones.
    pub fn inherit_missing(&mut self, other: &Filters) {
        for (key, value) in other.iter() {
            if !self.contains(key) {
                self.set(key, value);
            }
        }
    }

    /// Canonical `key=value;...` rendering for cache keys.
    pub fn canonical(&self) -> String {
        self.values
            .iter()
            .map(|(k, v)| format!("{}={}", k, v.to_lowercase()))
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// One unit of retrieved evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable source identifier (canonical URL or catalog id), cited in
    /// answers
    pub source_id: String,

    /// Id of the provider that produced this chunk
    pub provider_id: String,

    /// Short human-readable title
    pub title: String,

    /// Projected content payload (never the raw upstream dump)
    pub content: String,

    /// Relevance score local to the producing provider, in [0, 1]
    pub score: f32,

    /// Stable key for recognizing the same item across providers
    pub dedup_key: String,
}

/// Successful retrieval outcome from one provider call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResult {
    pub provider_id: String,
    pub chunks: Vec<Chunk>,
}

/// Typed failure from one provider call.
///
/// Ordinary outages and timeouts are data, not process errors: the merge
/// stage drops them and proceeds with whatever succeeded.
#[derive(Debug, Clone, Error)]
pub enum ProviderFailure {
    /// The call did not complete within its deadline
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The provider could not be reached or refused the call
    #[error("outage: {0}")]
    Outage(String),

    /// The provider responded with something unusable
    #[error("bad response: {0}")]
    BadResponse(String),
}

/// A chunk with its cross-provider score, as produced by the merge engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedChunk {
    pub chunk: Chunk,

    /// Weighted combination of local score and provider priority
    pub final_score: f32,

    /// Provider trust priority at merge time (tie-break input)
    pub priority: u32,

    /// Rank the chunk held within its own provider's result (tie-break input)
    pub original_rank: usize,
}

/// Deduplicated, reranked evidence across all providers.
///
/// Invariants: no two chunks share a dedup key; chunks are ordered by
/// descending final score with a deterministic tie-break.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergedResult {
    pub chunks: Vec<RankedChunk>,

    /// Providers whose calls failed (kept for logging and the degraded path)
    pub failed_providers: Vec<String>,

    /// Providers whose calls succeeded (possibly with zero chunks)
    pub succeeded_providers: Vec<String>,
}

impl MergedResult {
    /// True when no provider produced any evidence.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters_explicit_wins_over_inherited() {
        let mut current = Filters::new().with(filter_keys::STARS, "5");
        let prior = Filters::new()
            .with(filter_keys::STARS, "3")
            .with(filter_keys::LOCATION, "Bangkok");

        current.inherit_missing(&prior);

        assert_eq!(current.get(filter_keys::STARS), Some("5"));
        assert_eq!(current.get(filter_keys::LOCATION), Some("Bangkok"));
    }

    #[test]
    fn test_filters_canonical_is_deterministic() {
        let a = Filters::new()
            .with("location", "Bangkok")
            .with("price_max", "200");
        let b = Filters::new()
            .with("price_max", "200")
            .with("location", "Bangkok");

        assert_eq!(a.canonical(), b.canonical());
        assert_eq!(a.canonical(), "location=bangkok;price_max=200");
    }

    #[test]
    fn test_intent_string_form() {
        assert_eq!(Intent::Hotel.as_str(), "hotel");
        assert_eq!(Intent::Generic.to_string(), "generic");
    }
}
