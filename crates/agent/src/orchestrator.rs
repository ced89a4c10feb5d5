//! The request state machine.
//!
//! One orchestrator instance serves many concurrent requests; every
//! collaborator (model, providers, session store, cache) is passed in, not
//! reached through globals. Per request the flow is:
//!
//! resolve context → understand (clarification gate) → grounding decision →
//! [plan → fan-out → merge] → synthesize → critique → at most one
//! refinement pass → finalize.
//!
//! The refinement bound is structural: the second pass is straight-line
//! code, not a loop, so no critique outcome can trigger a third retrieval.

use crate::cache::{retrieval_cache_key, Cache};
use crate::session::SessionStore;
use crate::types::{
    normalize, Answer, ClarificationRequest, PipelineOutcome, Query, Turn, Understanding,
};
use crate::{context, critique, grounding, synthesis, understand};
use grounder_core::{AppError, AppResult, PipelinePolicy};
use grounder_llm::LlmClient;
use grounder_retrieval::{
    build_plan, fanout, merge, refine_plan, CallOutcome, GroundingMode, MergedResult,
    ProviderRegistry, ProviderResult, RetrievalPlan,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Critique-loop states. `Refining` can be entered at most once per
/// request; `Finalized` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DraftState {
    Drafted,
    Critiqued,
    Accepted,
    Refining,
    Finalized,
}

/// The agentic query pipeline.
pub struct Orchestrator {
    llm: Arc<dyn LlmClient>,
    model: String,
    registry: ProviderRegistry,
    session: Arc<dyn SessionStore>,
    cache: Arc<dyn Cache>,
    policy: PipelinePolicy,
}

impl Orchestrator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        model: impl Into<String>,
        registry: ProviderRegistry,
        session: Arc<dyn SessionStore>,
        cache: Arc<dyn Cache>,
        policy: PipelinePolicy,
    ) -> Self {
        Self {
            llm,
            model: model.into(),
            registry,
            session,
            cache,
            policy,
        }
    }

    /// Handle one query end to end.
    ///
    /// Returns an answer or a clarification request. The only fatal failure
    /// is an unreachable language-model capability; everything else
    /// degrades the answer.
    pub async fn handle_query(
        &self,
        conversation_id: &str,
        raw_query: &str,
    ) -> AppResult<PipelineOutcome> {
        let started = Instant::now();
        let raw_query = raw_query.trim();
        if raw_query.is_empty() {
            return Err(AppError::Other("Empty query".to_string()));
        }

        tracing::info!("Handling query for conversation {}", conversation_id);

        let turns = self.session.turns(conversation_id).await?;
        let turn_index = turns.len();
        let prior = turns.last();

        // Context resolution against the immediately preceding turn
        let resolved = context::resolve(
            raw_query,
            prior,
            self.llm.as_ref(),
            &self.model,
            self.policy.llm_deadline(),
        )
        .await?;

        if resolved.used_parent_context {
            tracing::debug!("Resolved with parent context: {}", resolved.text);
        }

        // Understanding and the clarification gate
        let mut understanding = understand::analyze(
            &resolved.text,
            self.llm.as_ref(),
            &self.model,
            &self.policy,
        )
        .await?;

        // Inherit prior-turn filters only for turns that leaned on context;
        // attributes the new query states explicitly always win
        if resolved.used_parent_context {
            if let Some(prior) = prior {
                understanding.filters.inherit_missing(&prior.filters);
            }
        }

        if understanding.needs_clarification {
            tracing::info!("Clarification required; returning questions");
            return Ok(PipelineOutcome::Clarification(ClarificationRequest {
                questions: understanding.clarification_questions,
            }));
        }

        // Grounding decision
        let normalized = normalize(&resolved.text);
        let mode = grounding::decide(understanding.intent, &understanding.filters, &normalized);
        tracing::info!(
            "Intent {} ({:.2} confidence), grounding mode {}",
            understanding.intent,
            understanding.confidence,
            mode
        );

        let query = Query {
            raw: raw_query.to_string(),
            normalized,
            intent: understanding.intent,
            filters: understanding.filters.clone(),
            conversation_id: conversation_id.to_string(),
            turn_index,
        };

        let outcome = if mode == GroundingMode::None {
            self.answer_ungrounded(&resolved.text, mode).await?
        } else {
            self.answer_grounded(&query, &resolved.text, mode, &understanding, started)
                .await?
        };

        self.record_turn(&query, &resolved.text).await;

        Ok(PipelineOutcome::Answer(outcome))
    }

    /// `GroundingMode::None`: answer directly from model knowledge, no
    /// provider calls, no critique.
    async fn answer_ungrounded(&self, query_text: &str, mode: GroundingMode) -> AppResult<Answer> {
        let draft =
            synthesis::answer_direct(self.llm.as_ref(), &self.model, query_text, &self.policy)
                .await?;

        Ok(Answer {
            text: draft.text,
            citations: draft.citations,
            grounding_mode: mode,
            critiqued: false,
            refined: false,
            degraded: draft.degraded,
        })
    }

    /// Hybrid/full modes: retrieve, synthesize, and in deep mode critique
    /// with at most one refinement pass.
    async fn answer_grounded(
        &self,
        query: &Query,
        query_text: &str,
        mode: GroundingMode,
        understanding: &Understanding,
        started: Instant,
    ) -> AppResult<Answer> {
        let (merged, first_plan) = self.retrieve(query, query_text, mode, started).await;

        if merged.is_empty() {
            tracing::warn!(
                "No evidence: {} provider(s) failed, {} empty",
                merged.failed_providers.len(),
                merged.succeeded_providers.len()
            );
            let draft = synthesis::no_evidence_answer(query_text);
            return Ok(Answer {
                text: draft.text,
                citations: draft.citations,
                grounding_mode: mode,
                critiqued: false,
                refined: false,
                degraded: true,
            });
        }

        let mut draft = synthesis::synthesize(
            self.llm.as_ref(),
            &self.model,
            query_text,
            &merged,
            &self.policy,
        )
        .await?;

        let mut state = DraftState::Drafted;
        let mut critiqued = false;
        let mut refined = false;

        // Shallow mode accepts the first pass and skips critique entirely
        if self.policy.deep_mode && !draft.degraded {
            let mut verdict = critique::evaluate(
                self.llm.as_ref(),
                &self.model,
                query_text,
                &draft.text,
                &merged,
                &self.policy,
            )
            .await?;
            critiqued = true;
            state = self.transition(state, DraftState::Critiqued);

            if !verdict.sufficiently_grounded {
                let followup = refine_plan(
                    query_text,
                    &understanding.filters,
                    &verdict.missing_aspects,
                    &first_plan,
                    &self.policy,
                );
                if !followup.is_empty() {
                    verdict.followup_plan = Some(followup);
                }
            }

            match verdict.followup_plan {
                // Grounded draft, or nothing new to ask the providers:
                // accept the first pass
                None => {
                    state = self.transition(state, DraftState::Accepted);
                }
                Some(followup) => {
                    state = self.transition(state, DraftState::Refining);

                    let second_outcomes =
                        fanout::execute(&followup, &self.registry, self.remaining(started)).await;

                    // Second-pass evidence joins the first pass before the
                    // re-rank, so the refined draft sees both
                    let mut combined = outcomes_from_merged(&merged);
                    combined.extend(second_outcomes);
                    let remerged = merge(combined, &self.policy);

                    if !remerged.is_empty() {
                        draft = synthesis::synthesize(
                            self.llm.as_ref(),
                            &self.model,
                            query_text,
                            &remerged,
                            &self.policy,
                        )
                        .await?;
                    }
                    refined = true;
                }
            }
        }

        // Terminal regardless of how the critique turned out: the second
        // pass never re-enters the loop
        let _ = self.transition(state, DraftState::Finalized);

        Ok(Answer {
            text: draft.text,
            citations: draft.citations,
            grounding_mode: mode,
            critiqued,
            refined,
            degraded: draft.degraded,
        })
    }

    /// Run the retrieval stage, memoized on the normalized query tuple.
    async fn retrieve(
        &self,
        query: &Query,
        query_text: &str,
        mode: GroundingMode,
        started: Instant,
    ) -> (MergedResult, RetrievalPlan) {
        let plan = build_plan(
            query_text,
            query.intent,
            &query.filters,
            mode,
            &self.registry,
            &self.policy,
        );

        let key = retrieval_cache_key(&query.normalized, query.intent, &query.filters, mode);
        if let Some(value) = self.cache.get(&key).await {
            if let Ok(merged) = serde_json::from_value::<MergedResult>(value) {
                tracing::debug!("Retrieval cache hit");
                return (merged, plan);
            }
        }

        let outcomes = fanout::execute(&plan, &self.registry, self.remaining(started)).await;
        let merged = merge(outcomes, &self.policy);

        if let Ok(value) = serde_json::to_value(&merged) {
            self.cache.put(&key, value, self.policy.cache_ttl()).await;
        }

        (merged, plan)
    }

    /// Time left inside the end-to-end request deadline.
    fn remaining(&self, started: Instant) -> Duration {
        self.policy.request_deadline().saturating_sub(started.elapsed())
    }

    fn transition(&self, from: DraftState, to: DraftState) -> DraftState {
        tracing::debug!("Critique state {:?} -> {:?}", from, to);
        to
    }

    /// Append the completed turn. Recording failures degrade future context
    /// resolution, not this answer.
    async fn record_turn(&self, query: &Query, resolved_text: &str) {
        let turn = Turn {
            query: query.raw.clone(),
            resolved_query: resolved_text.to_string(),
            intent: query.intent,
            filters: query.filters.clone(),
            asked_at: chrono::Utc::now(),
        };

        if let Err(err) = self.session.append_turn(&query.conversation_id, turn).await {
            tracing::warn!("Failed to record turn: {}", err);
        }
    }
}

/// Re-shape already-merged evidence into fan-out outcomes so a refinement
/// pass can re-rank first- and second-pass chunks together.
fn outcomes_from_merged(merged: &MergedResult) -> Vec<CallOutcome> {
    let mut by_provider: Vec<(String, Vec<_>)> = Vec::new();

    for ranked in &merged.chunks {
        let provider_id = ranked.chunk.provider_id.clone();
        match by_provider.iter_mut().find(|(id, _)| *id == provider_id) {
            Some((_, chunks)) => chunks.push(ranked.chunk.clone()),
            None => by_provider.push((provider_id, vec![ranked.chunk.clone()])),
        }
    }

    by_provider
        .into_iter()
        .map(|(provider_id, chunks)| {
            (
                provider_id.clone(),
                Ok(ProviderResult {
                    provider_id,
                    chunks,
                }),
            )
        })
        .collect()
}
