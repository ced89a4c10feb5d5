//! Merge/rerank engine.
//!
//! Takes the settled outcomes of a fan-out and produces one deduplicated,
//! cross-provider-ranked evidence list. Failures are dropped (and logged);
//! a single successful provider is enough for the request to proceed.

use crate::fanout::CallOutcome;
use crate::types::{Chunk, MergedResult, RankedChunk};
use grounder_core::PipelinePolicy;
use std::collections::HashMap;

/// Merge provider outcomes into a ranked evidence list.
///
/// Invariants on the output:
/// - no two chunks share a dedup key (higher local score wins; exact score
///   ties go to the higher-priority provider)
/// - chunks are ordered by descending cross-provider score, ties broken by
///   provider priority, then the chunk's rank within its own provider
/// - at most `policy.top_k` chunks survive
pub fn merge(outcomes: Vec<CallOutcome>, policy: &PipelinePolicy) -> MergedResult {
    let mut failed_providers = Vec::new();
    let mut succeeded_providers = Vec::new();
    let mut candidates: Vec<(Chunk, u32, usize)> = Vec::new();

    for (provider_id, outcome) in outcomes {
        match outcome {
            Ok(result) => {
                succeeded_providers.push(provider_id);
                let priority = policy.priority_for(&result.provider_id);
                for (rank, chunk) in result.chunks.into_iter().enumerate() {
                    candidates.push((chunk, priority, rank));
                }
            }
            Err(failure) => {
                tracing::warn!("Provider {} failed: {}", provider_id, failure);
                failed_providers.push(provider_id);
            }
        }
    }

    // Deduplicate by key: higher local score wins, exact ties go to the
    // higher-priority provider, further ties keep the first seen.
    let mut by_key: HashMap<String, (Chunk, u32, usize)> = HashMap::new();
    for (chunk, priority, rank) in candidates {
        match by_key.get(&chunk.dedup_key) {
            Some((kept, kept_priority, _)) => {
                let replaces = chunk.score > kept.score
                    || (chunk.score == kept.score && priority > *kept_priority);
                if replaces {
                    by_key.insert(chunk.dedup_key.clone(), (chunk, priority, rank));
                }
            }
            None => {
                by_key.insert(chunk.dedup_key.clone(), (chunk, priority, rank));
            }
        }
    }

    let max_priority = policy.max_priority() as f32;
    let mut chunks: Vec<RankedChunk> = by_key
        .into_values()
        .map(|(chunk, priority, original_rank)| {
            let final_score = policy.local_score_weight * chunk.score
                + policy.priority_weight * (priority as f32 / max_priority);
            RankedChunk {
                chunk,
                final_score,
                priority,
                original_rank,
            }
        })
        .collect();

    chunks.sort_by(|a, b| {
        b.final_score
            .total_cmp(&a.final_score)
            .then(b.priority.cmp(&a.priority))
            .then(a.original_rank.cmp(&b.original_rank))
            .then(a.chunk.dedup_key.cmp(&b.chunk.dedup_key))
    });

    chunks.truncate(policy.top_k);

    tracing::debug!(
        "Merged to {} chunk(s); {} provider(s) succeeded, {} failed",
        chunks.len(),
        succeeded_providers.len(),
        failed_providers.len()
    );

    MergedResult {
        chunks,
        failed_providers,
        succeeded_providers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ProviderFailure, ProviderResult};
    use std::collections::HashSet;
    use std::time::Duration;

    fn chunk(provider_id: &str, key: &str, score: f32) -> Chunk {
        Chunk {
            source_id: format!("https://example.com/{}", key),
            provider_id: provider_id.to_string(),
            title: key.to_string(),
            content: format!("content for {}", key),
            score,
            dedup_key: key.to_string(),
        }
    }

    fn ok(provider_id: &str, chunks: Vec<Chunk>) -> CallOutcome {
        (
            provider_id.to_string(),
            Ok(ProviderResult {
                provider_id: provider_id.to_string(),
                chunks,
            }),
        )
    }

    fn failed(provider_id: &str) -> CallOutcome {
        (
            provider_id.to_string(),
            Err(ProviderFailure::Timeout(Duration::from_secs(4))),
        )
    }

    #[test]
    fn test_no_duplicate_dedup_keys() {
        let policy = PipelinePolicy::default();
        let merged = merge(
            vec![
                ok("web", vec![chunk("web", "a", 0.9), chunk("web", "b", 0.8)]),
                ok("shopping", vec![chunk("shopping", "a", 0.7)]),
            ],
            &policy,
        );

        let keys: HashSet<&str> = merged
            .chunks
            .iter()
            .map(|c| c.chunk.dedup_key.as_str())
            .collect();
        assert_eq!(keys.len(), merged.chunks.len());
    }

    #[test]
    fn test_partial_success_keeps_surviving_provider() {
        let policy = PipelinePolicy::default();
        let five: Vec<Chunk> = (0..5)
            .map(|i| chunk("hotels", &format!("k{}", i), 0.9 - i as f32 * 0.1))
            .collect();

        let merged = merge(vec![ok("web", vec![]), ok("hotels", five)], &policy);

        assert_eq!(merged.chunks.len(), 5);
        assert!(merged
            .chunks
            .iter()
            .all(|c| c.chunk.provider_id == "hotels"));
        assert!(merged.failed_providers.is_empty());
        assert_eq!(merged.succeeded_providers.len(), 2);
    }

    #[test]
    fn test_exact_tie_goes_to_higher_priority_provider() {
        let policy = PipelinePolicy::default(); // shopping=3, web=1
        let merged = merge(
            vec![
                ok("web", vec![chunk("web", "same", 0.8)]),
                ok("shopping", vec![chunk("shopping", "same", 0.8)]),
            ],
            &policy,
        );

        assert_eq!(merged.chunks.len(), 1);
        assert_eq!(merged.chunks[0].chunk.provider_id, "shopping");
    }

    #[test]
    fn test_higher_local_score_beats_priority_on_dedup() {
        let policy = PipelinePolicy::default();
        let merged = merge(
            vec![
                ok("web", vec![chunk("web", "same", 0.95)]),
                ok("shopping", vec![chunk("shopping", "same", 0.5)]),
            ],
            &policy,
        );

        assert_eq!(merged.chunks.len(), 1);
        assert_eq!(merged.chunks[0].chunk.provider_id, "web");
    }

    #[test]
    fn test_all_failures_yield_empty_result() {
        let policy = PipelinePolicy::default();
        let merged = merge(vec![failed("web"), failed("hotels")], &policy);

        assert!(merged.is_empty());
        assert_eq!(merged.failed_providers.len(), 2);
        assert!(merged.succeeded_providers.is_empty());
    }

    #[test]
    fn test_ordering_is_descending_by_final_score() {
        let policy = PipelinePolicy::default();
        let merged = merge(
            vec![
                ok("web", vec![chunk("web", "w1", 0.9), chunk("web", "w2", 0.3)]),
                ok("shopping", vec![chunk("shopping", "s1", 0.6)]),
            ],
            &policy,
        );

        for pair in merged.chunks.windows(2) {
            assert!(pair[0].final_score >= pair[1].final_score);
        }
    }

    #[test]
    fn test_priority_weight_lifts_trusted_provider() {
        let policy = PipelinePolicy::default();
        // Same local score from both providers, distinct items
        let merged = merge(
            vec![
                ok("web", vec![chunk("web", "w", 0.7)]),
                ok("shopping", vec![chunk("shopping", "s", 0.7)]),
            ],
            &policy,
        );

        assert_eq!(merged.chunks[0].chunk.provider_id, "shopping");
    }

    #[test]
    fn test_truncation_to_top_k() {
        let mut policy = PipelinePolicy::default();
        policy.top_k = 3;

        let many: Vec<Chunk> = (0..10)
            .map(|i| chunk("web", &format!("k{}", i), 1.0 - i as f32 * 0.05))
            .collect();
        let merged = merge(vec![ok("web", many)], &policy);

        assert_eq!(merged.chunks.len(), 3);
    }
}
