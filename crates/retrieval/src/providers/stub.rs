//! Configurable in-memory provider for deterministic tests.

use crate::provider::Provider;
use crate::types::{Chunk, Filters, Intent, ProviderFailure, ProviderResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// In-memory provider returning canned chunks, an injected failure, or
/// nothing, optionally after an artificial delay so deadline behavior can
/// be exercised. Calls are counted.
pub struct StubProvider {
    id: String,
    intents: Vec<Intent>,
    chunks: Vec<Chunk>,
    failure: Option<ProviderFailure>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StubProvider {
    /// Create a stub capable of every intent and returning no chunks.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            intents: vec![
                Intent::Shopping,
                Intent::Hotel,
                Intent::Flight,
                Intent::Movie,
                Intent::Place,
                Intent::Generic,
            ],
            chunks: Vec::new(),
            failure: None,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of retrieve calls served so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Restrict the capability set.
    pub fn with_intents(mut self, intents: &[Intent]) -> Self {
        self.intents = intents.to_vec();
        self
    }

    /// Canned chunks to return on success.
    pub fn with_chunks(mut self, chunks: Vec<Chunk>) -> Self {
        self.chunks = chunks;
        self
    }

    /// Fail every call with the given failure.
    pub fn with_failure(mut self, failure: ProviderFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    /// Sleep before answering, to simulate a slow upstream.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Convenience constructor for a canned chunk.
    pub fn chunk(
        provider_id: &str,
        source_id: &str,
        title: &str,
        score: f32,
        dedup_key: &str,
    ) -> Chunk {
        Chunk {
            source_id: source_id.to_string(),
            provider_id: provider_id.to_string(),
            title: title.to_string(),
            content: format!("{} (stub content)", title),
            score,
            dedup_key: dedup_key.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl Provider for StubProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn supports(&self, intent: Intent) -> bool {
        self.intents.contains(&intent)
    }

    async fn retrieve(
        &self,
        _query: &str,
        _filters: &Filters,
        _deadline: Duration,
    ) -> Result<ProviderResult, ProviderFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }

        Ok(ProviderResult {
            provider_id: self.id.clone(),
            chunks: self.chunks.clone(),
        })
    }
}
