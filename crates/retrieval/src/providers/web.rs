//! Broad web-search provider adapter.
//!
//! The catch-all provider: capable of every intent, used alone in hybrid
//! grounding mode and alongside domain providers in full mode. Organic
//! results are projected to title, snippet, and displayed source.

use crate::provider::Provider;
use crate::providers::search_api::{canonical_url_key, rank_score, SearchApi};
use crate::types::{Chunk, Filters, Intent, ProviderFailure, ProviderResult};
use grounder_core::SearchConfig;
use serde::Deserialize;
use std::time::Duration;

/// Web payload subset we project from.
#[derive(Debug, Deserialize)]
struct WebPayload {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    title: Option<String>,
    link: Option<String>,
    snippet: Option<String>,
    source: Option<String>,
}

/// Broad web-search provider.
pub struct WebProvider {
    api: SearchApi,
}

impl WebProvider {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            api: SearchApi::new(config),
        }
    }

    /// Project one organic result into a chunk. Results need both a title
    /// and a link to be citable.
    fn project(result: &OrganicResult, index: usize, total: usize) -> Option<Chunk> {
        let title = result.title.as_deref()?.trim();
        let link = result.link.as_deref()?.trim();
        if title.is_empty() || link.is_empty() {
            return None;
        }

        let mut lines = vec![title.to_string()];
        if let Some(snippet) = &result.snippet {
            lines.push(snippet.clone());
        }
        if let Some(source) = &result.source {
            lines.push(format!("Source: {}", source));
        }

        Some(Chunk {
            source_id: link.to_string(),
            provider_id: "web".to_string(),
            title: title.to_string(),
            content: lines.join("\n"),
            score: rank_score(index, total),
            dedup_key: canonical_url_key(link),
        })
    }
}

#[async_trait::async_trait]
impl Provider for WebProvider {
    fn id(&self) -> &str {
        "web"
    }

    fn supports(&self, _intent: Intent) -> bool {
        // Broad web search can serve any intent, at lower trust
        true
    }

    async fn retrieve(
        &self,
        query: &str,
        _filters: &Filters,
        deadline: Duration,
    ) -> Result<ProviderResult, ProviderFailure> {
        let payload = self.api.fetch("google", query, &[], deadline).await?;

        let payload: WebPayload = serde_json::from_value(payload)
            .map_err(|e| ProviderFailure::BadResponse(format!("Web payload: {}", e)))?;

        let total = payload.organic_results.len();
        let chunks: Vec<Chunk> = payload
            .organic_results
            .iter()
            .enumerate()
            .filter_map(|(i, result)| Self::project(result, i, total))
            .collect();

        tracing::debug!("Web provider projected {}/{} results", chunks.len(), total);

        Ok(ProviderResult {
            provider_id: self.id().to_string(),
            chunks,
        })
    }
}
