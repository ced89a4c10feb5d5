//! Critique of a draft answer.
//!
//! In deep mode, a second model call judges whether the draft is
//! sufficiently grounded in the retrieved evidence and names the aspects
//! still missing. A critique that cannot be obtained accepts the draft:
//! the critique loop improves answers, it must never break a request.

use crate::types::Verdict;
use grounder_core::{AppError, AppResult, PipelinePolicy};
use grounder_llm::{parse_structured, LlmClient, LlmRequest};
use grounder_retrieval::MergedResult;
use serde::Deserialize;

/// Strict output contract for the critique call.
#[derive(Debug, Deserialize)]
struct CritiqueReply {
    sufficiently_grounded: bool,
    #[serde(default)]
    missing_aspects: Vec<String>,
}

/// Evaluate a draft answer against the query and the available evidence.
///
/// Only `AppError::LlmUnavailable` propagates; any other failure yields an
/// accepting verdict.
pub async fn evaluate(
    llm: &dyn LlmClient,
    model: &str,
    query: &str,
    draft_text: &str,
    merged: &MergedResult,
    policy: &PipelinePolicy,
) -> AppResult<Verdict> {
    let evidence_titles: Vec<String> = merged
        .chunks
        .iter()
        .map(|ranked| format!("- {}", ranked.chunk.title))
        .collect();

    let request = LlmRequest::new(
        format!(
            "Question:\n{}\n\nDraft answer:\n{}\n\nEvidence available:\n{}",
            query,
            draft_text,
            evidence_titles.join("\n")
        ),
        model,
    )
    .with_system(
        "Judge whether the draft answer is adequately supported by the \
         listed evidence for this question. Reply with a single JSON \
         object: {\"sufficiently_grounded\": boolean, \"missing_aspects\": \
         [string]} where missing_aspects names concrete things to look up \
         that would close the gaps. Keep missing_aspects empty when the \
         draft is adequate.",
    )
    .with_temperature(0.0)
    .with_timeout(policy.llm_deadline());

    match llm.complete(&request).await {
        Ok(response) => match parse_structured::<CritiqueReply>(&response.content) {
            Ok(reply) => Ok(Verdict {
                sufficiently_grounded: reply.sufficiently_grounded,
                missing_aspects: reply.missing_aspects,
                followup_plan: None,
            }),
            Err(_) => {
                tracing::warn!("Critique output unparsable, accepting draft");
                Ok(accepting_verdict())
            }
        },
        Err(err @ AppError::LlmUnavailable(_)) => Err(err),
        Err(err) => {
            tracing::warn!("Critique call failed ({}), accepting draft", err);
            Ok(accepting_verdict())
        }
    }
}

fn accepting_verdict() -> Verdict {
    Verdict {
        sufficiently_grounded: true,
        missing_aspects: Vec::new(),
        followup_plan: None,
    }
}
