//! Grounding-mode decision.
//!
//! A deterministic function of intent, filter completeness, and a freshness
//! heuristic. This gate is a cost/quality trade-off, not a correctness
//! gate: it exists to skip retrieval for queries that do not need it.

use grounder_retrieval::{Filters, GroundingMode, Intent};

/// Queries implying live prices or availability always need planned
/// multi-provider retrieval.
const PRICE_AVAILABILITY_TERMS: &[&str] = &[
    "price",
    "prices",
    "cost",
    "how much",
    "in stock",
    "available",
    "availability",
    "deal",
    "cheapest",
];

/// Queries about the current state of the world need at least one live
/// lookup.
const FRESHNESS_TERMS: &[&str] = &[
    "latest",
    "current",
    "today",
    "tonight",
    "now",
    "this week",
    "this year",
    "recent",
    "news",
    "weather",
];

/// Decide how much external evidence a query requires.
pub fn decide(intent: Intent, filters: &Filters, normalized_query: &str) -> GroundingMode {
    // Domain intents imply live inventory: always full retrieval
    if !matches!(intent, Intent::Generic) {
        return GroundingMode::Full;
    }

    if PRICE_AVAILABILITY_TERMS
        .iter()
        .any(|t| normalized_query.contains(t))
    {
        return GroundingMode::Full;
    }

    if FRESHNESS_TERMS.iter().any(|t| normalized_query.contains(t)) {
        return GroundingMode::Hybrid;
    }

    // A generic query carrying concrete filters still profits from one
    // broad lookup
    if !filters.is_empty() {
        return GroundingMode::Hybrid;
    }

    GroundingMode::None
}
