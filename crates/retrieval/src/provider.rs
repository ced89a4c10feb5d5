//! Provider capability trait and registry.
//!
//! A provider is a capability record, not a class hierarchy: anything that
//! implements `retrieve` with the contract below qualifies, whether it wraps
//! a keyword search, a vector index, or a paginated HTTP API. The planner
//! selects providers through the registry's capability lookup, never by
//! concrete type.

use crate::types::{Filters, Intent, ProviderFailure, ProviderResult};
use std::sync::Arc;
use std::time::Duration;

/// Retrieval capability contract.
///
/// Implementations must:
/// - respect `deadline` (abort and return `ProviderFailure::Timeout` past it)
/// - return partial results when only some items are usable
/// - report outages and empty upstreams as typed failures or empty results,
///   never as a panic or process-level error
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    /// Stable provider id (e.g., "web", "shopping", "hotels").
    fn id(&self) -> &str;

    /// Whether this provider can serve the given intent.
    fn supports(&self, intent: Intent) -> bool;

    /// Retrieve evidence for a query under a deadline.
    async fn retrieve(
        &self,
        query: &str,
        filters: &Filters,
        deadline: Duration,
    ) -> Result<ProviderResult, ProviderFailure>;
}

/// Capability lookup table over the registered providers.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider. Later registrations with a duplicate id are
    /// ignored; the first registration wins.
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        if self.get(provider.id()).is_none() {
            self.providers.push(provider);
        } else {
            tracing::warn!("Ignoring duplicate provider registration: {}", provider.id());
        }
    }

    /// Look up a provider by id.
    pub fn get(&self, id: &str) -> Option<Arc<dyn Provider>> {
        self.providers.iter().find(|p| p.id() == id).cloned()
    }

    /// All providers capable of serving an intent, in registration order.
    pub fn capable_of(&self, intent: Intent) -> Vec<Arc<dyn Provider>> {
        self.providers
            .iter()
            .filter(|p| p.supports(intent))
            .cloned()
            .collect()
    }

    /// Registered provider ids, in registration order.
    pub fn ids(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.id().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::StubProvider;

    #[test]
    fn test_capability_lookup() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(
            StubProvider::new("web").with_intents(&[Intent::Generic, Intent::Place]),
        ));
        registry.register(Arc::new(
            StubProvider::new("hotels").with_intents(&[Intent::Hotel]),
        ));

        let capable = registry.capable_of(Intent::Hotel);
        assert_eq!(capable.len(), 1);
        assert_eq!(capable[0].id(), "hotels");

        assert!(registry.capable_of(Intent::Movie).is_empty());
    }

    #[test]
    fn test_duplicate_registration_ignored() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(StubProvider::new("web")));
        registry.register(Arc::new(StubProvider::new("web")));

        assert_eq!(registry.ids(), vec!["web".to_string()]);
    }
}
