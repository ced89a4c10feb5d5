//! Pipeline data model: queries, turns, verdicts, and answers.

use chrono::{DateTime, Utc};
use grounder_retrieval::{Filters, GroundingMode, Intent, RetrievalPlan};
use serde::{Deserialize, Serialize};

/// A fully-constructed query, immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    /// Text as the caller sent it
    pub raw: String,

    /// Normalized text (trimmed, lowercased, whitespace collapsed)
    pub normalized: String,

    /// Detected intent
    pub intent: Intent,

    /// Extracted filters (explicit plus inherited)
    pub filters: Filters,

    /// Conversation this query belongs to
    pub conversation_id: String,

    /// Zero-based position within the conversation
    pub turn_index: usize,
}

/// One completed turn of a conversation.
///
/// Turn history is append-only; a recorded turn is never rewritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub query: String,
    pub resolved_query: String,
    pub intent: Intent,
    pub filters: Filters,
    pub asked_at: DateTime<Utc>,
}

/// Output of the query-understanding stage.
#[derive(Debug, Clone)]
pub struct Understanding {
    pub intent: Intent,
    pub confidence: f32,
    pub filters: Filters,
    pub rewritten_query: String,
    pub needs_clarification: bool,
    pub clarification_questions: Vec<String>,
}

/// Judgment of the critique agent over a draft answer.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub sufficiently_grounded: bool,
    pub missing_aspects: Vec<String>,

    /// Follow-up plan derived from the missing aspects, when one exists
    pub followup_plan: Option<RetrievalPlan>,
}

/// One citation in an answer, pointing at a chunk's source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub source_id: String,
    pub title: String,
}

/// Terminal artifact of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// Final answer text
    pub text: String,

    /// Evidence the answer cites
    pub citations: Vec<Citation>,

    /// How much external evidence the request used
    pub grounding_mode: GroundingMode,

    /// Whether a critique pass evaluated the draft
    pub critiqued: bool,

    /// Whether a refinement retrieval pass ran
    pub refined: bool,

    /// Whether this is a degraded (best-effort) answer
    pub degraded: bool,
}

/// Clarifying questions returned instead of an answer.
///
/// A valid terminal state, not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClarificationRequest {
    pub questions: Vec<String>,
}

/// What a request ultimately produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum PipelineOutcome {
    Answer(Answer),
    Clarification(ClarificationRequest),
}

/// Normalize query text: trim, collapse whitespace, lowercase.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Hotels   in  Bangkok "), "hotels in bangkok");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_outcome_serialization_tags_kind() {
        let outcome = PipelineOutcome::Clarification(ClarificationRequest {
            questions: vec!["Which city?".to_string()],
        });
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"kind\":\"clarification\""));
    }
}
