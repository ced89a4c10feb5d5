//! Follow-up resolution against conversation context.
//!
//! Rewrites a follow-up query to stand alone, filling in location, entity,
//! and modifier references from the immediately preceding turn; deeper
//! history is never consulted. Resolution is attempted through the model
//! under a strict JSON contract; when that fails, a deterministic fallback
//! inherits only the prior turn's location/category token. Failure to
//! resolve is never fatal.

use crate::types::Turn;
use grounder_core::{AppError, AppResult};
use grounder_llm::{parse_structured, LlmClient, LlmRequest};
use grounder_retrieval::filter_keys;
use serde::Deserialize;
use std::time::Duration;

/// A query rewritten to stand alone.
#[derive(Debug, Clone)]
pub struct ResolvedQuery {
    pub text: String,
    pub used_parent_context: bool,
}

/// Strict output contract for the resolution call.
#[derive(Debug, Deserialize)]
struct ResolutionReply {
    resolved_query: String,
    #[serde(default)]
    used_parent_context: bool,
}

/// Resolve a query against the immediately preceding turn.
///
/// Returns the raw query untouched when the conversation has no history.
/// Only `AppError::LlmUnavailable` propagates; any other model failure
/// falls back deterministically.
pub async fn resolve(
    raw_query: &str,
    prior: Option<&Turn>,
    llm: &dyn LlmClient,
    model: &str,
    deadline: Duration,
) -> AppResult<ResolvedQuery> {
    let Some(prior) = prior else {
        return Ok(ResolvedQuery {
            text: raw_query.to_string(),
            used_parent_context: false,
        });
    };

    let request = LlmRequest::new(resolution_prompt(raw_query, prior), model)
        .with_system(
            "You rewrite follow-up search queries so they stand alone. \
             Reply with a single JSON object: \
             {\"resolved_query\": string, \"used_parent_context\": boolean}. \
             Carry over locations, entities, and modifiers from the previous \
             query only where the new query does not already state them; \
             anything the new query states explicitly must be kept unchanged.",
        )
        .with_temperature(0.0)
        .with_timeout(deadline);

    match llm.complete(&request).await {
        Ok(response) => match parse_structured::<ResolutionReply>(&response.content) {
            Ok(reply) if !reply.resolved_query.trim().is_empty() => Ok(ResolvedQuery {
                text: reply.resolved_query.trim().to_string(),
                used_parent_context: reply.used_parent_context,
            }),
            Ok(_) | Err(_) => {
                tracing::warn!("Context resolution returned unparsable output, falling back");
                Ok(fallback(raw_query, prior))
            }
        },
        Err(err @ AppError::LlmUnavailable(_)) => Err(err),
        Err(err) => {
            tracing::warn!("Context resolution call failed ({}), falling back", err);
            Ok(fallback(raw_query, prior))
        }
    }
}

/// Deterministic fallback: inherit only the prior turn's location/category
/// token, leaving every other attribute untouched.
fn fallback(raw_query: &str, prior: &Turn) -> ResolvedQuery {
    let lower = raw_query.to_lowercase();

    let inherited = prior
        .filters
        .get(filter_keys::LOCATION)
        .or_else(|| prior.filters.get(filter_keys::CATEGORY))
        .filter(|token| !lower.contains(&token.to_lowercase()));

    match inherited {
        Some(token) => ResolvedQuery {
            text: format!("{} in {}", raw_query.trim(), token),
            used_parent_context: true,
        },
        None => ResolvedQuery {
            text: raw_query.trim().to_string(),
            used_parent_context: false,
        },
    }
}

fn resolution_prompt(raw_query: &str, prior: &Turn) -> String {
    format!(
        "Previous query: {}\nPrevious query (resolved): {}\nNew query: {}",
        prior.query, prior.resolved_query, raw_query
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use grounder_llm::ScriptedClient;
    use grounder_retrieval::{Filters, Intent};

    fn prior_turn() -> Turn {
        Turn {
            query: "hotels in bangkok".to_string(),
            resolved_query: "hotels in Bangkok".to_string(),
            intent: Intent::Hotel,
            filters: Filters::new().with(filter_keys::LOCATION, "Bangkok"),
            asked_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_first_turn_passes_through() {
        let llm = ScriptedClient::new();
        let resolved = resolve(
            "hotels in bangkok",
            None,
            &llm,
            "test-model",
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        assert_eq!(resolved.text, "hotels in bangkok");
        assert!(!resolved.used_parent_context);
        assert_eq!(llm.call_count(), 0, "no model call without history");
    }

    #[tokio::test]
    async fn test_model_resolution_is_used_when_parsable() {
        let llm = ScriptedClient::new();
        llm.push_text(
            r#"{"resolved_query": "5 star hotels in Bangkok", "used_parent_context": true}"#,
        );

        let resolved = resolve(
            "only 5 star hotels",
            Some(&prior_turn()),
            &llm,
            "test-model",
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        assert_eq!(resolved.text, "5 star hotels in Bangkok");
        assert!(resolved.used_parent_context);
    }

    #[tokio::test]
    async fn test_unparsable_reply_falls_back_to_location_inheritance() {
        let llm = ScriptedClient::new();
        llm.push_malformed("I think you mean hotels?");

        let resolved = resolve(
            "only 5 star hotels",
            Some(&prior_turn()),
            &llm,
            "test-model",
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        assert_eq!(resolved.text, "only 5 star hotels in Bangkok");
        assert!(resolved.used_parent_context);
    }

    #[tokio::test]
    async fn test_timeout_falls_back_instead_of_failing() {
        let llm = ScriptedClient::new();
        llm.push_timeout();

        let resolved = resolve(
            "cheaper ones",
            Some(&prior_turn()),
            &llm,
            "test-model",
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        assert!(resolved.text.contains("Bangkok"));
        assert!(resolved.used_parent_context);
    }

    #[tokio::test]
    async fn test_unavailable_model_is_fatal() {
        let llm = ScriptedClient::new();
        llm.push_unavailable();

        let result = resolve(
            "cheaper ones",
            Some(&prior_turn()),
            &llm,
            "test-model",
            Duration::from_secs(1),
        )
        .await;

        assert!(matches!(result, Err(AppError::LlmUnavailable(_))));
    }

    #[tokio::test]
    async fn test_fallback_does_not_duplicate_present_location() {
        let llm = ScriptedClient::new();
        llm.push_timeout();

        let resolved = resolve(
            "hotels in Bangkok near the river",
            Some(&prior_turn()),
            &llm,
            "test-model",
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        assert_eq!(resolved.text, "hotels in Bangkok near the river");
        assert!(!resolved.used_parent_context);
    }
}
