//! Shared HTTP transport for the hosted search API.
//!
//! The web/shopping/hotels adapters all talk to the same search endpoint
//! with different `engine` parameters. This module owns the request
//! plumbing: key injection, locale parameters, deadline enforcement, and
//! the mapping of transport problems onto `ProviderFailure`.
//!
//! Upstream error bodies are summarized, never forwarded: callers only ever
//! see the status code.

use crate::types::ProviderFailure;
use grounder_core::SearchConfig;
use std::time::Duration;

/// Thin client over the hosted search API.
pub(crate) struct SearchApi {
    endpoint: String,
    api_key: Option<String>,
    locale: String,
    country: String,
    client: reqwest::Client,
}

impl SearchApi {
    pub(crate) fn new(config: &SearchConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            api_key: config.resolve_api_key(),
            locale: config.locale.clone(),
            country: config.country.clone(),
            client: reqwest::Client::new(),
        }
    }

    /// Issue one search call and return the parsed JSON payload.
    pub(crate) async fn fetch(
        &self,
        engine: &str,
        query: &str,
        extra: &[(&str, String)],
        deadline: Duration,
    ) -> Result<serde_json::Value, ProviderFailure> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            ProviderFailure::Outage("Search API key not configured".to_string())
        })?;

        let mut params: Vec<(&str, String)> = vec![
            ("engine", engine.to_string()),
            ("q", query.to_string()),
            ("hl", self.locale.clone()),
            ("gl", self.country.clone()),
            ("api_key", api_key.clone()),
        ];
        params.extend(extra.iter().map(|(k, v)| (*k, v.clone())));

        tracing::debug!("Search call: engine={}, query={}", engine, query);

        let response = self
            .client
            .get(&self.endpoint)
            .query(&params)
            .timeout(deadline)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderFailure::Timeout(deadline)
                } else {
                    ProviderFailure::Outage(format!("Network error contacting search API: {}", e))
                }
            })?;

        if !response.status().is_success() {
            return Err(ProviderFailure::BadResponse(format!(
                "Search API error {}",
                response.status().as_u16()
            )));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| ProviderFailure::BadResponse(format!("Unparsable search payload: {}", e)))
    }
}

/// Position-based local relevance: upstream results arrive ranked, so rank
/// maps onto a [1/n, 1] score.
pub(crate) fn rank_score(index: usize, total: usize) -> f32 {
    if total == 0 {
        return 0.0;
    }
    1.0 - (index as f32 / total as f32)
}

/// Canonical dedup key for a result URL: scheme, query string, fragment and
/// trailing slash stripped, lowercased.
pub(crate) fn canonical_url_key(url: &str) -> String {
    let stripped = url
        .trim()
        .strip_prefix("https://")
        .or_else(|| url.trim().strip_prefix("http://"))
        .unwrap_or(url.trim());

    let no_query = stripped
        .split(['?', '#'])
        .next()
        .unwrap_or(stripped);

    no_query.trim_end_matches('/').to_lowercase()
}
