//! Query understanding and the clarification gate.
//!
//! Produces intent, filters, and a rewritten query for a resolved query.
//! Intent detection runs a deterministic keyword pass first; the model is
//! only consulted for queries the keyword pass scores as ambiguous. When
//! the intent stays ambiguous, or a required filter cannot be defaulted,
//! the gate asks for clarification instead of guessing, a valid terminal
//! state for the request.

use crate::types::{normalize, Understanding};
use grounder_core::{AppError, AppResult, PipelinePolicy};
use grounder_llm::{parse_structured, LlmClient, LlmRequest};
use grounder_retrieval::{filter_keys, Filters, Intent};
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

const HOTEL_TERMS: &[&str] = &[
    "hotel",
    "hotels",
    "motel",
    "motels",
    "resort",
    "resorts",
    "hostel",
    "bed and breakfast",
    "b&b",
    "vacation rental",
    "lodging",
    "accommodation",
];

const FLIGHT_TERMS: &[&str] = &[
    "flight",
    "flights",
    "airfare",
    "fly to",
    "plane ticket",
    "round trip",
    "layover",
];

const MOVIE_TERMS: &[&str] = &[
    "movie", "movies", "film", "films", "showtimes", "cinema", "trailer",
];

const PLACE_TERMS: &[&str] = &[
    "restaurant",
    "restaurants",
    "cafe",
    "coffee shop",
    "bar",
    "museum",
    "attractions",
    "things to do",
    "near me",
];

const SHOPPING_TERMS: &[&str] = &[
    "buy",
    "deal",
    "deals",
    "cheap",
    "sneakers",
    "shoes",
    "laptop",
    "phone",
    "iphone",
    "case",
    "jeans",
    "jacket",
    "dress",
    "headphones",
    "bag",
    "sweater",
];

const BRANDS: &[&str] = &[
    "nike", "adidas", "puma", "apple", "samsung", "sony", "dell", "lenovo", "asus",
];

/// Words that end a location phrase.
const LOCATION_STOPS: &[&str] = &["under", "below", "for", "with", "from", "between", "during"];

/// Strict output contract for the model-assisted classification.
#[derive(Debug, Deserialize)]
struct IntentReply {
    intent: Intent,
    confidence: f32,
}

/// Analyze a resolved query: intent, filters, clarification gate.
///
/// Only `AppError::LlmUnavailable` propagates; a failed assist keeps the
/// keyword classification.
pub async fn analyze(
    resolved_query: &str,
    llm: &dyn LlmClient,
    model: &str,
    policy: &PipelinePolicy,
) -> AppResult<Understanding> {
    let normalized = normalize(resolved_query);
    let (mut intent, mut confidence) = keyword_intent(&normalized);

    if confidence < policy.clarification_confidence {
        match classify_with_model(resolved_query, llm, model, policy).await {
            Ok(Some(reply)) => {
                tracing::debug!(
                    "Model classified ambiguous query as {} ({:.2})",
                    reply.intent,
                    reply.confidence
                );
                intent = reply.intent;
                confidence = reply.confidence.clamp(0.0, 1.0);
            }
            Ok(None) => {}
            Err(err) => return Err(err),
        }
    }

    let filters = extract_filters(resolved_query, intent);
    let (needs_clarification, clarification_questions) =
        clarification_gate(intent, confidence, &filters, policy);

    Ok(Understanding {
        intent,
        confidence,
        filters,
        rewritten_query: resolved_query.trim().to_string(),
        needs_clarification,
        clarification_questions,
    })
}

/// Deterministic keyword classification with a confidence estimate.
fn keyword_intent(normalized: &str) -> (Intent, f32) {
    let vocabularies: [(Intent, &[&str]); 5] = [
        (Intent::Hotel, HOTEL_TERMS),
        (Intent::Flight, FLIGHT_TERMS),
        (Intent::Movie, MOVIE_TERMS),
        (Intent::Place, PLACE_TERMS),
        (Intent::Shopping, SHOPPING_TERMS),
    ];

    let mut scored: Vec<(Intent, usize)> = vocabularies
        .iter()
        .map(|(intent, terms)| {
            let hits = terms.iter().filter(|t| normalized.contains(*t)).count();
            (*intent, hits)
        })
        .collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1));

    let (best_intent, best_hits) = scored[0];
    let runner_up_hits = scored[1].1;

    if best_hits == 0 {
        let confidence = if is_definitional(normalized) { 0.9 } else { 0.55 };
        return (Intent::Generic, confidence);
    }

    if best_hits == runner_up_hits {
        // Two vocabularies tied: ambiguous
        return (best_intent, 0.5);
    }

    let confidence = if best_hits >= 2 { 0.9 } else { 0.75 };
    (best_intent, confidence)
}

/// Questions that the model can answer from its own knowledge read as
/// high-confidence generic queries.
fn is_definitional(normalized: &str) -> bool {
    const OPENERS: &[&str] = &[
        "what", "who", "when", "where", "why", "how", "define", "explain", "is ", "are ",
        "does ", "did ",
    ];
    OPENERS.iter().any(|opener| normalized.starts_with(opener))
}

/// Ask the model to classify an ambiguous query. `Ok(None)` means the
/// assist failed recoverably and the keyword result stands.
async fn classify_with_model(
    query: &str,
    llm: &dyn LlmClient,
    model: &str,
    policy: &PipelinePolicy,
) -> AppResult<Option<IntentReply>> {
    let request = LlmRequest::new(format!("Query: {}", query), model)
        .with_system(
            "Classify the search query into one of: shopping, hotel, flight, \
             movie, place, generic. Reply with a single JSON object: \
             {\"intent\": string, \"confidence\": number between 0 and 1}.",
        )
        .with_temperature(0.0)
        .with_timeout(policy.llm_deadline());

    match llm.complete(&request).await {
        Ok(response) => Ok(parse_structured::<IntentReply>(&response.content).ok()),
        Err(err @ AppError::LlmUnavailable(_)) => Err(err),
        Err(err) => {
            tracing::warn!("Intent classification assist failed: {}", err);
            Ok(None)
        }
    }
}

/// Extract filters the pipeline understands from the query text.
fn extract_filters(query: &str, intent: Intent) -> Filters {
    let mut filters = Filters::new();
    let lower = query.to_lowercase();

    if let Some(location) = extract_location(&lower) {
        filters.set(filter_keys::LOCATION, location);
    }

    if let Some(price) = price_regex()
        .captures(&lower)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().replace(',', ""))
    {
        filters.set(filter_keys::PRICE_MAX, price);
    }

    if let Some(stars) = stars_regex()
        .captures(&lower)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
    {
        filters.set(filter_keys::STARS, stars);
    }

    if let Some(captures) = dates_regex().captures(&lower) {
        if let (Some(from), Some(to)) = (captures.get(1), captures.get(2)) {
            filters.set(
                filter_keys::DATES,
                format!("{}/{}", from.as_str(), to.as_str()),
            );
        }
    }

    if let Some(brand) = BRANDS.iter().find(|b| lower.contains(*b)) {
        filters.set(filter_keys::BRAND, title_case(brand));
    }

    if let Some(category) = category_term(&lower, intent) {
        filters.set(filter_keys::CATEGORY, category);
    }

    filters
}

/// Location phrase after "in"/"near"/"at", ended by punctuation, a stop
/// word, or a digit.
fn extract_location(lower: &str) -> Option<String> {
    for preposition in ["in", "near", "at"] {
        let marker = format!(" {} ", preposition);
        let Some(pos) = lower.find(&marker) else {
            continue;
        };

        let rest = &lower[pos + marker.len()..];
        let mut words = Vec::new();
        for word in rest.split_whitespace() {
            let cleaned = word.trim_matches(|c: char| c.is_ascii_punctuation());
            if cleaned.is_empty()
                || LOCATION_STOPS.contains(&cleaned)
                || cleaned.chars().any(|c| c.is_ascii_digit())
            {
                break;
            }
            words.push(cleaned);
        }

        // "near me" is not a place name
        if words.is_empty() || words == ["me"] || words == ["the"] {
            continue;
        }

        return Some(title_case(&words.join(" ")));
    }

    None
}

/// The matched domain term, recorded so context resolution can inherit a
/// category token on later turns.
fn category_term(lower: &str, intent: Intent) -> Option<String> {
    let terms: &[&str] = match intent {
        Intent::Hotel => HOTEL_TERMS,
        Intent::Flight => FLIGHT_TERMS,
        Intent::Movie => MOVIE_TERMS,
        Intent::Place => PLACE_TERMS,
        Intent::Shopping => SHOPPING_TERMS,
        Intent::Generic => return None,
    };
    terms
        .iter()
        .find(|t| lower.contains(*t))
        .map(|t| t.to_string())
}

/// The clarification gate: ambiguous intent, or a required filter that
/// cannot be defaulted.
fn clarification_gate(
    intent: Intent,
    confidence: f32,
    filters: &Filters,
    policy: &PipelinePolicy,
) -> (bool, Vec<String>) {
    let mut questions = Vec::new();

    if confidence < policy.clarification_confidence {
        questions
            .push("Could you say a bit more about what you're looking for?".to_string());
    }

    match intent {
        Intent::Flight if !filters.contains(filter_keys::DATES) => {
            questions.push("What dates do you plan to travel?".to_string());
        }
        Intent::Hotel if !filters.contains(filter_keys::LOCATION) => {
            questions.push("Which city or area should I look for hotels in?".to_string());
        }
        _ => {}
    }

    (!questions.is_empty(), questions)
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn price_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:under|below|less than|up to)\s*\$?\s*(\d[\d,]*)")
            .expect("price regex is valid")
    })
}

fn stars_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d)\s*[- ]?\s*star").expect("stars regex is valid"))
}

fn dates_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d{4}-\d{2}-\d{2})\s*(?:to|until|through|/)\s*(\d{4}-\d{2}-\d{2})")
            .expect("dates regex is valid")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use grounder_llm::ScriptedClient;

    async fn analyze_with(llm: &ScriptedClient, query: &str) -> Understanding {
        analyze(query, llm, "test-model", &PipelinePolicy::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_hotel_queries_from_corpus() {
        let llm = ScriptedClient::new();
        for query in [
            "Hotels in Salt Lake City",
            "motels under $200",
            "resort in Miami",
            "bed and breakfast in Vermont",
            "vacation rental in Hawaii",
        ] {
            let understanding = analyze_with(&llm, query).await;
            assert_eq!(understanding.intent, Intent::Hotel, "query: {}", query);
        }
        assert_eq!(llm.call_count(), 0, "keyword pass needs no model");
    }

    #[tokio::test]
    async fn test_shopping_query_with_brand_and_price() {
        let llm = ScriptedClient::new();
        let understanding = analyze_with(&llm, "Nike sneakers under $100").await;

        assert_eq!(understanding.intent, Intent::Shopping);
        assert_eq!(understanding.filters.get(filter_keys::BRAND), Some("Nike"));
        assert_eq!(
            understanding.filters.get(filter_keys::PRICE_MAX),
            Some("100")
        );
        assert!(!understanding.needs_clarification);
    }

    #[tokio::test]
    async fn test_location_extraction_multi_word() {
        let llm = ScriptedClient::new();
        let understanding = analyze_with(&llm, "Hotels in Salt Lake City").await;
        assert_eq!(
            understanding.filters.get(filter_keys::LOCATION),
            Some("Salt Lake City")
        );
    }

    #[tokio::test]
    async fn test_definitional_query_is_confident_generic() {
        let llm = ScriptedClient::new();
        let understanding = analyze_with(&llm, "what is the capital of France").await;

        assert_eq!(understanding.intent, Intent::Generic);
        assert!(understanding.confidence >= 0.9);
        assert!(!understanding.needs_clarification);
    }

    #[tokio::test]
    async fn test_flight_without_dates_requires_clarification() {
        let llm = ScriptedClient::new();
        let understanding = analyze_with(&llm, "flights to Tokyo").await;

        assert_eq!(understanding.intent, Intent::Flight);
        assert!(understanding.needs_clarification);
        assert!(understanding
            .clarification_questions
            .iter()
            .any(|q| q.contains("dates")));
    }

    #[tokio::test]
    async fn test_flight_with_dates_passes_gate() {
        let llm = ScriptedClient::new();
        let understanding =
            analyze_with(&llm, "flights to Tokyo 2026-09-01 to 2026-09-10").await;

        assert_eq!(understanding.intent, Intent::Flight);
        assert_eq!(
            understanding.filters.get(filter_keys::DATES),
            Some("2026-09-01/2026-09-10")
        );
        assert!(!understanding.needs_clarification);
    }

    #[tokio::test]
    async fn test_hotel_without_location_requires_clarification() {
        let llm = ScriptedClient::new();
        let understanding = analyze_with(&llm, "5 star hotels").await;

        assert_eq!(understanding.intent, Intent::Hotel);
        assert!(understanding.needs_clarification);
    }

    #[tokio::test]
    async fn test_ambiguous_query_consults_model() {
        let llm = ScriptedClient::new();
        llm.push_text(r#"{"intent": "shopping", "confidence": 0.85}"#);

        let understanding = analyze_with(&llm, "something nice for the weekend").await;

        assert_eq!(llm.call_count(), 1);
        assert_eq!(understanding.intent, Intent::Shopping);
        assert!(!understanding.needs_clarification);
    }

    #[tokio::test]
    async fn test_failed_assist_keeps_keyword_result_and_clarifies() {
        let llm = ScriptedClient::new();
        llm.push_timeout();

        let understanding = analyze_with(&llm, "something nice for the weekend").await;

        assert_eq!(understanding.intent, Intent::Generic);
        assert!(understanding.needs_clarification);
    }

    #[tokio::test]
    async fn test_stars_filter() {
        let llm = ScriptedClient::new();
        let understanding = analyze_with(&llm, "only 5 star hotels in Bangkok").await;
        assert_eq!(understanding.filters.get(filter_keys::STARS), Some("5"));
    }
}
