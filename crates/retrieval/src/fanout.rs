//! Concurrent execution of a retrieval plan.
//!
//! All calls of a plan run concurrently, each bounded by its own deadline.
//! The fan-out suspends until every call settles, success or failure, or
//! until the overall deadline elapses, at which point still-pending calls
//! are abandoned and recorded as timeouts. Cancellation degrades quality
//! rather than failing the request.

use crate::planner::RetrievalPlan;
use crate::provider::ProviderRegistry;
use crate::types::{ProviderFailure, ProviderResult};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashSet;
use std::time::Duration;

/// Settled outcome of one planned call.
pub type CallOutcome = (String, Result<ProviderResult, ProviderFailure>);

/// Execute every call of a plan concurrently.
///
/// Returns one outcome per planned call, in settlement order. Calls that do
/// not settle before `overall_deadline` are reported as
/// `ProviderFailure::Timeout`.
pub async fn execute(
    plan: &RetrievalPlan,
    registry: &ProviderRegistry,
    overall_deadline: Duration,
) -> Vec<CallOutcome> {
    if plan.is_empty() {
        return Vec::new();
    }

    let mut pending: FuturesUnordered<_> = plan
        .calls
        .iter()
        .enumerate()
        .map(|(index, call)| {
            let provider = registry.get(&call.provider_id);
            let call = call.clone();
            async move {
                let result = match provider {
                    Some(provider) => {
                        match tokio::time::timeout(
                            call.deadline,
                            provider.retrieve(&call.query, &call.filters, call.deadline),
                        )
                        .await
                        {
                            Ok(result) => result,
                            Err(_) => Err(ProviderFailure::Timeout(call.deadline)),
                        }
                    }
                    // A plan should only name registered providers; treat a
                    // stale id as an outage, not a panic.
                    None => Err(ProviderFailure::Outage(format!(
                        "Unknown provider: {}",
                        call.provider_id
                    ))),
                };
                (index, call.provider_id, result)
            }
        })
        .collect();

    let mut outcomes: Vec<CallOutcome> = Vec::with_capacity(plan.calls.len());
    let mut settled: HashSet<usize> = HashSet::new();

    let overall = tokio::time::sleep(overall_deadline);
    tokio::pin!(overall);

    loop {
        tokio::select! {
            next = pending.next() => match next {
                Some((index, provider_id, result)) => {
                    settled.insert(index);
                    outcomes.push((provider_id, result));
                }
                None => break,
            },
            _ = &mut overall => {
                tracing::warn!(
                    "Overall deadline elapsed with {} provider call(s) pending",
                    plan.calls.len() - settled.len()
                );
                for (index, call) in plan.calls.iter().enumerate() {
                    if !settled.contains(&index) {
                        outcomes.push((
                            call.provider_id.clone(),
                            Err(ProviderFailure::Timeout(overall_deadline)),
                        ));
                    }
                }
                break;
            }
        }
    }

    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{PlanPass, PlannedCall};
    use crate::providers::StubProvider;
    use crate::types::Filters;
    use std::sync::Arc;

    fn call(provider_id: &str, deadline_ms: u64) -> PlannedCall {
        PlannedCall {
            provider_id: provider_id.to_string(),
            query: "query".to_string(),
            filters: Filters::new(),
            deadline: Duration::from_millis(deadline_ms),
        }
    }

    fn plan(calls: Vec<PlannedCall>) -> RetrievalPlan {
        RetrievalPlan {
            calls,
            pass: PlanPass::Initial,
        }
    }

    #[tokio::test]
    async fn test_all_calls_settle() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(StubProvider::new("a").with_chunks(vec![
            StubProvider::chunk("a", "s1", "one", 0.9, "k1"),
        ])));
        registry.register(Arc::new(StubProvider::new("b")));

        let outcomes = execute(
            &plan(vec![call("a", 1000), call("b", 1000)]),
            &registry,
            Duration::from_secs(5),
        )
        .await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|(_, r)| r.is_ok()));
    }

    #[tokio::test]
    async fn test_slow_provider_times_out_others_survive() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(
            StubProvider::new("slow").with_delay(Duration::from_secs(10)),
        ));
        registry.register(Arc::new(StubProvider::new("fast").with_chunks(vec![
            StubProvider::chunk("fast", "s1", "one", 0.9, "k1"),
        ])));

        let outcomes = execute(
            &plan(vec![call("slow", 50), call("fast", 1000)]),
            &registry,
            Duration::from_secs(5),
        )
        .await;

        assert_eq!(outcomes.len(), 2);
        let slow = outcomes.iter().find(|(id, _)| id == "slow").unwrap();
        let fast = outcomes.iter().find(|(id, _)| id == "fast").unwrap();
        assert!(matches!(slow.1, Err(ProviderFailure::Timeout(_))));
        assert!(fast.1.is_ok());
    }

    #[tokio::test]
    async fn test_overall_deadline_abandons_stragglers() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(
            StubProvider::new("glacial").with_delay(Duration::from_secs(30)),
        ));
        registry.register(Arc::new(StubProvider::new("instant").with_chunks(vec![
            StubProvider::chunk("instant", "s1", "one", 0.9, "k1"),
        ])));

        // Per-call deadline longer than the overall deadline: the overall
        // deadline must win.
        let outcomes = execute(
            &plan(vec![call("glacial", 60_000), call("instant", 60_000)]),
            &registry,
            Duration::from_millis(100),
        )
        .await;

        assert_eq!(outcomes.len(), 2);
        let glacial = outcomes.iter().find(|(id, _)| id == "glacial").unwrap();
        let instant = outcomes.iter().find(|(id, _)| id == "instant").unwrap();
        assert!(matches!(glacial.1, Err(ProviderFailure::Timeout(_))));
        assert!(instant.1.is_ok(), "completed call survives the cutoff");
    }

    #[tokio::test]
    async fn test_unknown_provider_is_an_outage() {
        let registry = ProviderRegistry::new();
        let outcomes = execute(
            &plan(vec![call("ghost", 1000)]),
            &registry,
            Duration::from_secs(1),
        )
        .await;

        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0].1, Err(ProviderFailure::Outage(_))));
    }

    #[tokio::test]
    async fn test_empty_plan_short_circuits() {
        let registry = ProviderRegistry::new();
        let outcomes = execute(
            &RetrievalPlan::empty(PlanPass::Initial),
            &registry,
            Duration::from_secs(1),
        )
        .await;
        assert!(outcomes.is_empty());
    }
}
