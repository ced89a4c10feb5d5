//! Structured-output extraction from model text.
//!
//! Every strict-output contract in the pipeline (context resolution, query
//! understanding, synthesis, critique) asks the model for a single JSON
//! document. Models do not always comply cleanly: the document may arrive
//! raw, inside a fenced code block, or embedded in prose. This module
//! extracts and deserializes it, so callers can treat "unparsable" as one
//! failure case and apply their bounded-retry policy.

use grounder_core::{AppError, AppResult};
use serde::de::DeserializeOwned;

/// Parse a JSON document of type `T` out of raw model output.
///
/// Tries, in order: the whole trimmed text, the contents of the first fenced
/// code block, and the widest `{...}` span. Returns
/// `AppError::Serialization` when no candidate deserializes.
pub fn parse_structured<T: DeserializeOwned>(text: &str) -> AppResult<T> {
    for candidate in candidates(text) {
        if let Ok(value) = serde_json::from_str::<T>(&candidate) {
            return Ok(value);
        }
    }

    Err(AppError::Serialization(format!(
        "No parsable JSON document in model output ({} chars)",
        text.len()
    )))
}

/// Candidate JSON spans in preference order.
fn candidates(text: &str) -> Vec<String> {
    let mut out = Vec::new();

    let trimmed = text.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }

    if let Some(fenced) = extract_fenced(trimmed) {
        out.push(fenced);
    }

    if let Some(span) = extract_brace_span(trimmed) {
        out.push(span);
    }

    out
}

/// Contents of the first ``` fence, tolerating a language tag.
fn extract_fenced(text: &str) -> Option<String> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    // Skip the optional language tag line ("json", "JSON", ...)
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    let inner = body[..end].trim();
    if inner.is_empty() {
        None
    } else {
        Some(inner.to_string())
    }
}

/// Widest span from the first `{` to the last `}`.
fn extract_brace_span(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(text[start..=end].to_string())
}
