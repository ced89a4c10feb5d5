//! Answer synthesis.
//!
//! The model writes the answer; this module owns everything around that
//! call: assembling the grounding context under a character budget, the
//! structured `{answer, citations}` contract, the single stricter-format
//! retry on unparsable output, and the degraded best-effort fallback.

use crate::types::{Citation, normalize};
use grounder_core::{AppError, AppResult, PipelinePolicy};
use grounder_llm::{parse_structured, LlmClient, LlmRequest};
use grounder_retrieval::MergedResult;
use serde::Deserialize;
use std::collections::HashMap;

/// A synthesized draft answer.
#[derive(Debug, Clone)]
pub struct Draft {
    pub text: String,
    pub citations: Vec<Citation>,
    pub degraded: bool,
}

/// Strict output contract for the synthesis call.
#[derive(Debug, Deserialize)]
struct SynthesisReply {
    answer: String,
    #[serde(default)]
    citations: Vec<String>,
}

/// Synthesize a cited answer from merged evidence.
///
/// One retry with a stricter format instruction on unparsable output, then
/// a degraded best-effort answer. Only `AppError::LlmUnavailable`
/// propagates.
pub async fn synthesize(
    llm: &dyn LlmClient,
    model: &str,
    query: &str,
    merged: &MergedResult,
    policy: &PipelinePolicy,
) -> AppResult<Draft> {
    let (context, tags) = build_context(merged, policy.context_budget_chars);

    let mut last_text: Option<String> = None;

    for attempt in 0..2 {
        let request = LlmRequest::new(
            format!("Question:\n{}\n\nEvidence:\n{}", query, context),
            model,
        )
        .with_system(synthesis_instructions(attempt > 0))
        .with_temperature(0.3)
        .with_timeout(policy.llm_deadline());

        match llm.complete(&request).await {
            Ok(response) => match parse_structured::<SynthesisReply>(&response.content) {
                Ok(reply) if !reply.answer.trim().is_empty() => {
                    return Ok(Draft {
                        text: reply.answer.trim().to_string(),
                        citations: map_citations(&reply.citations, &tags),
                        degraded: false,
                    });
                }
                Ok(_) | Err(_) => {
                    tracing::warn!(
                        "Synthesis output unparsable (attempt {}), {}",
                        attempt + 1,
                        if attempt == 0 {
                            "retrying with strict format"
                        } else {
                            "degrading"
                        }
                    );
                    last_text = Some(response.content);
                }
            },
            Err(err @ AppError::LlmUnavailable(_)) => return Err(err),
            Err(err) => {
                tracing::warn!("Synthesis call failed (attempt {}): {}", attempt + 1, err);
            }
        }
    }

    Ok(degraded_draft(last_text, merged))
}

/// Answer a query directly from model knowledge, with no retrieval and no
/// citations. Used for `GroundingMode::None`.
pub async fn answer_direct(
    llm: &dyn LlmClient,
    model: &str,
    query: &str,
    policy: &PipelinePolicy,
) -> AppResult<Draft> {
    let request = LlmRequest::new(query, model)
        .with_system(
            "Answer the question directly and concisely from your own \
             knowledge. Do not fabricate sources.",
        )
        .with_temperature(0.3)
        .with_timeout(policy.llm_deadline());

    match llm.complete(&request).await {
        Ok(response) => Ok(Draft {
            text: response.content.trim().to_string(),
            citations: Vec::new(),
            degraded: false,
        }),
        Err(err @ AppError::LlmUnavailable(_)) => Err(err),
        Err(err) => {
            tracing::warn!("Direct answer failed: {}", err);
            Ok(Draft {
                text: "I couldn't produce an answer for this just now. Please try again."
                    .to_string(),
                citations: Vec::new(),
                degraded: true,
            })
        }
    }
}

/// Apologetic answer for a request whose grounding mode required evidence
/// but whose providers all failed or came back empty.
pub fn no_evidence_answer(query: &str) -> Draft {
    Draft {
        text: format!(
            "I wasn't able to retrieve any current results for \"{}\". The \
             sources I rely on didn't respond; please try again in a moment.",
            query
        ),
        citations: Vec::new(),
        degraded: true,
    }
}

/// Assemble the grounding context: ranked chunks as numbered source blocks,
/// cut off at the character budget. At least one chunk is always included.
fn build_context(
    merged: &MergedResult,
    budget_chars: usize,
) -> (String, HashMap<String, Citation>) {
    let mut blocks = Vec::new();
    let mut tags = HashMap::new();
    let mut used = 0usize;

    for (index, ranked) in merged.chunks.iter().enumerate() {
        let tag = format!("S{}", index + 1);
        let block = format!("[{}] {}\n{}", tag, ranked.chunk.title, ranked.chunk.content);

        if !blocks.is_empty() && used + block.len() > budget_chars {
            break;
        }
        used += block.len();

        tags.insert(
            tag.clone(),
            Citation {
                source_id: ranked.chunk.source_id.clone(),
                title: ranked.chunk.title.clone(),
            },
        );
        blocks.push(block);
    }

    (blocks.join("\n\n"), tags)
}

fn synthesis_instructions(strict: bool) -> String {
    let mut instructions = String::from(
        "Answer the question using only the numbered evidence blocks. \
         Reply with a single JSON object: {\"answer\": string, \
         \"citations\": [string]} where citations lists the tags (e.g. \
         \"S1\") of every evidence block you relied on. Cite every claim. \
         If the evidence does not cover part of the question, say so in the \
         answer rather than inventing details.",
    );

    if strict {
        instructions.push_str(
            " Output the JSON object only: no prose, no code fences, no \
             text before or after it.",
        );
    }

    instructions
}

/// Resolve the model's cited tags ("S1", or a bare "1") against the context
/// tag map, dropping anything unknown.
fn map_citations(cited: &[String], tags: &HashMap<String, Citation>) -> Vec<Citation> {
    let mut citations = Vec::new();
    let mut seen = Vec::new();

    for raw in cited {
        let tag = raw.trim();
        let tag = if tag.chars().all(|c| c.is_ascii_digit()) {
            format!("S{}", tag)
        } else {
            tag.to_uppercase()
        };

        if seen.contains(&tag) {
            continue;
        }

        if let Some(citation) = tags.get(&tag) {
            citations.push(citation.clone());
            seen.push(tag);
        } else {
            tracing::debug!("Dropping unknown citation tag: {}", raw);
        }
    }

    citations
}

/// Best-effort degraded draft: the model's raw prose if any attempt
/// produced text, otherwise a summary built from the top evidence.
fn degraded_draft(last_text: Option<String>, merged: &MergedResult) -> Draft {
    let text = match last_text {
        Some(text) if !normalize(&text).is_empty() => text.trim().to_string(),
        _ => {
            let titles: Vec<String> = merged
                .chunks
                .iter()
                .take(5)
                .map(|ranked| format!("- {}", ranked.chunk.title))
                .collect();
            format!(
                "I couldn't put together a fully cited answer. The most \
                 relevant results I found:\n{}",
                titles.join("\n")
            )
        }
    };

    Draft {
        text,
        citations: Vec::new(),
        degraded: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grounder_llm::ScriptedClient;
    use grounder_retrieval::{Chunk, RankedChunk};

    fn merged(n: usize) -> MergedResult {
        MergedResult {
            chunks: (0..n)
                .map(|i| RankedChunk {
                    chunk: Chunk {
                        source_id: format!("https://example.com/{}", i),
                        provider_id: "web".to_string(),
                        title: format!("Result {}", i),
                        content: format!("Content of result {}", i),
                        score: 1.0 - i as f32 * 0.1,
                        dedup_key: format!("k{}", i),
                    },
                    final_score: 1.0 - i as f32 * 0.1,
                    priority: 1,
                    original_rank: i,
                })
                .collect(),
            failed_providers: Vec::new(),
            succeeded_providers: vec!["web".to_string()],
        }
    }

    #[tokio::test]
    async fn test_clean_synthesis_maps_citations() {
        let llm = ScriptedClient::new();
        llm.push_text(r#"{"answer": "Result 0 covers it.", "citations": ["S1"]}"#);

        let draft = synthesize(
            &llm,
            "test-model",
            "question",
            &merged(3),
            &PipelinePolicy::default(),
        )
        .await
        .unwrap();

        assert!(!draft.degraded);
        assert_eq!(draft.text, "Result 0 covers it.");
        assert_eq!(draft.citations.len(), 1);
        assert_eq!(draft.citations[0].source_id, "https://example.com/0");
    }

    #[tokio::test]
    async fn test_unparsable_output_retries_once_then_degrades() {
        let llm = ScriptedClient::new();
        llm.push_malformed("Sure! The answer is things.");
        llm.push_malformed("Still not JSON, but here is prose.");

        let draft = synthesize(
            &llm,
            "test-model",
            "question",
            &merged(2),
            &PipelinePolicy::default(),
        )
        .await
        .unwrap();

        assert_eq!(llm.call_count(), 2, "exactly one retry");
        assert!(draft.degraded);
        assert!(draft.citations.is_empty());
        assert_eq!(draft.text, "Still not JSON, but here is prose.");

        // The retry carried the stricter instruction
        let calls = llm.calls();
        let second_system = calls[1].system.as_deref().unwrap_or_default();
        assert!(second_system.contains("JSON object only"));
    }

    #[tokio::test]
    async fn test_retry_success_is_not_degraded() {
        let llm = ScriptedClient::new();
        llm.push_malformed("prose");
        llm.push_text(r#"{"answer": "Second time lucky.", "citations": ["S2"]}"#);

        let draft = synthesize(
            &llm,
            "test-model",
            "question",
            &merged(3),
            &PipelinePolicy::default(),
        )
        .await
        .unwrap();

        assert!(!draft.degraded);
        assert_eq!(draft.citations[0].source_id, "https://example.com/1");
    }

    #[tokio::test]
    async fn test_unknown_citation_tags_are_dropped() {
        let llm = ScriptedClient::new();
        llm.push_text(r#"{"answer": "ok", "citations": ["S1", "S99", "1"]}"#);

        let draft = synthesize(
            &llm,
            "test-model",
            "question",
            &merged(2),
            &PipelinePolicy::default(),
        )
        .await
        .unwrap();

        // "S1" and bare "1" are the same source; "S99" doesn't exist
        assert_eq!(draft.citations.len(), 1);
    }

    #[tokio::test]
    async fn test_context_budget_truncates_blocks() {
        let mut policy = PipelinePolicy::default();
        policy.context_budget_chars = 80;

        let llm = ScriptedClient::new();
        llm.push_text(r#"{"answer": "ok", "citations": []}"#);

        synthesize(&llm, "test-model", "q", &merged(10), &policy)
            .await
            .unwrap();

        let prompt = &llm.calls()[0].prompt;
        assert!(prompt.contains("[S1]"));
        assert!(!prompt.contains("[S9]"), "budget keeps the tail out");
    }

    #[tokio::test]
    async fn test_unavailable_model_is_fatal() {
        let llm = ScriptedClient::new();
        llm.push_unavailable();

        let result = synthesize(
            &llm,
            "test-model",
            "q",
            &merged(1),
            &PipelinePolicy::default(),
        )
        .await;
        assert!(matches!(result, Err(AppError::LlmUnavailable(_))));
    }

    #[tokio::test]
    async fn test_direct_answer_has_no_citations() {
        let llm = ScriptedClient::new();
        llm.push_text("Paris is the capital of France.");

        let draft = answer_direct(
            &llm,
            "test-model",
            "what is the capital of France",
            &PipelinePolicy::default(),
        )
        .await
        .unwrap();

        assert!(!draft.degraded);
        assert!(draft.citations.is_empty());
        assert!(draft.text.contains("Paris"));
    }

    #[test]
    fn test_no_evidence_answer_is_degraded() {
        let draft = no_evidence_answer("hotels in bangkok");
        assert!(draft.degraded);
        assert!(draft.citations.is_empty());
        assert!(draft.text.contains("hotels in bangkok"));
    }
}
