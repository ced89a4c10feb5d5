//! Retrieval planning.
//!
//! The planner turns (intent, filters, grounding mode) into a concrete set
//! of provider calls, and turns a critique verdict's missing aspects into a
//! narrower follow-up plan. Providers are selected through the registry's
//! capability lookup; a provider is never planned for an intent outside its
//! advertised set.

use crate::provider::ProviderRegistry;
use crate::types::{filter_keys, Filters, GroundingMode, Intent};
use grounder_core::PipelinePolicy;
use std::time::Duration;

/// Maximum missing aspects turned into follow-up calls on a refinement pass.
const MAX_REFINEMENT_ASPECTS: usize = 3;

/// One planned provider call.
#[derive(Debug, Clone)]
pub struct PlannedCall {
    pub provider_id: String,
    pub query: String,
    pub filters: Filters,
    pub deadline: Duration,
}

impl PlannedCall {
    /// Whether two calls would hit the provider with identical parameters.
    /// Deadlines are not part of a call's identity.
    pub fn same_request(&self, other: &PlannedCall) -> bool {
        self.provider_id == other.provider_id
            && self.query == other.query
            && self.filters == other.filters
    }
}

/// Which pass of the request produced a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanPass {
    Initial,
    Refinement,
}

/// An ordered set of provider calls for one request pass.
#[derive(Debug, Clone)]
pub struct RetrievalPlan {
    pub calls: Vec<PlannedCall>,
    pub pass: PlanPass,
}

impl RetrievalPlan {
    pub fn empty(pass: PlanPass) -> Self {
        Self {
            calls: Vec::new(),
            pass,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Whether this plan already contains an identical call.
    pub fn contains_request(&self, call: &PlannedCall) -> bool {
        self.calls.iter().any(|c| c.same_request(call))
    }
}

/// Build the first-pass plan for a query.
///
/// `GroundingMode::None` yields an empty plan; `Hybrid` plans a single broad
/// web lookup; `Full` fans out to every provider capable of the intent.
pub fn build_plan(
    query: &str,
    intent: Intent,
    filters: &Filters,
    mode: GroundingMode,
    registry: &ProviderRegistry,
    policy: &PipelinePolicy,
) -> RetrievalPlan {
    let deadline = policy.provider_deadline();
    let projected = project_query(query, filters);

    let calls: Vec<PlannedCall> = match mode {
        GroundingMode::None => Vec::new(),
        GroundingMode::Hybrid => registry
            .get("web")
            .into_iter()
            .map(|provider| PlannedCall {
                provider_id: provider.id().to_string(),
                query: projected.clone(),
                filters: filters.clone(),
                deadline,
            })
            .collect(),
        GroundingMode::Full => registry
            .capable_of(intent)
            .into_iter()
            .map(|provider| PlannedCall {
                provider_id: provider.id().to_string(),
                query: projected.clone(),
                filters: filters.clone(),
                deadline,
            })
            .collect(),
    };

    tracing::debug!(
        "Planned {} provider call(s) for intent={} mode={}",
        calls.len(),
        intent,
        mode
    );

    RetrievalPlan {
        calls,
        pass: PlanPass::Initial,
    }
}

/// Build the refinement plan from a critique's missing aspects.
///
/// The follow-up is narrower than the first pass: only the most trusted
/// provider of the exhausted plan is re-used, one call per missing aspect,
/// and any call identical to an already-exhausted one is dropped.
pub fn refine_plan(
    query: &str,
    filters: &Filters,
    missing_aspects: &[String],
    exhausted: &RetrievalPlan,
    policy: &PipelinePolicy,
) -> RetrievalPlan {
    let mut plan = RetrievalPlan::empty(PlanPass::Refinement);

    if missing_aspects.is_empty() || exhausted.is_empty() {
        return plan;
    }

    // Most trusted provider among those already consulted
    let provider_id = exhausted
        .calls
        .iter()
        .map(|call| call.provider_id.as_str())
        .max_by_key(|id| policy.priority_for(id))
        .map(str::to_string);

    let Some(provider_id) = provider_id else {
        return plan;
    };

    let deadline = policy.provider_deadline();
    let base = project_query(query, filters);

    for aspect in missing_aspects.iter().take(MAX_REFINEMENT_ASPECTS) {
        let aspect = aspect.trim();
        if aspect.is_empty() {
            continue;
        }

        let call = PlannedCall {
            provider_id: provider_id.clone(),
            query: format!("{} {}", base, aspect),
            filters: filters.clone(),
            deadline,
        };

        if exhausted.contains_request(&call) || plan.contains_request(&call) {
            tracing::debug!("Skipping already-exhausted refinement call: {}", call.query);
            continue;
        }

        plan.calls.push(call);
    }

    tracing::debug!("Refinement plan has {} call(s)", plan.calls.len());
    plan
}

/// Fold filter attributes the provider query should carry into the query
/// text. Attributes already present in the text are not repeated.
fn project_query(query: &str, filters: &Filters) -> String {
    let mut projected = query.trim().to_string();
    let lower = projected.to_lowercase();

    if let Some(location) = filters.get(filter_keys::LOCATION) {
        if !lower.contains(&location.to_lowercase()) {
            projected.push_str(&format!(" in {}", location));
        }
    }

    if let Some(stars) = filters.get(filter_keys::STARS) {
        if !lower.contains("star") {
            projected.push_str(&format!(" {} star", stars));
        }
    }

    if let Some(price) = filters.get(filter_keys::PRICE_MAX) {
        if !lower.contains("under") && !lower.contains('$') {
            projected.push_str(&format!(" under ${}", price));
        }
    }

    projected
}
