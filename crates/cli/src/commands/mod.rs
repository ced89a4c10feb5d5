//! Command handlers for the Grounder CLI.
//!
//! This module organizes all CLI commands into separate submodules and
//! holds the shared wiring that turns a config into a running pipeline.

pub mod ask;
pub mod chat;
pub mod providers;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use chat::ChatCommand;
pub use providers::ProvidersCommand;

use grounder_agent::{InMemoryCache, InMemorySessionStore, Orchestrator};
use grounder_core::{AppConfig, AppError, AppResult};
use grounder_retrieval::providers::{HotelsProvider, ShoppingProvider, WebProvider};
use grounder_retrieval::ProviderRegistry;
use std::sync::Arc;

/// Register the built-in provider adapters.
pub(crate) fn build_registry(config: &AppConfig) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(WebProvider::new(&config.search)));
    registry.register(Arc::new(ShoppingProvider::new(&config.search)));
    registry.register(Arc::new(HotelsProvider::new(&config.search)));
    registry
}

/// Wire up the full pipeline for one CLI invocation.
pub(crate) fn build_orchestrator(config: &AppConfig) -> AppResult<Orchestrator> {
    let llm = grounder_llm::create_client(
        &config.provider,
        config.endpoint.as_deref(),
        config.api_key.as_deref(),
    )
    .map_err(AppError::Config)?;

    Ok(Orchestrator::new(
        llm,
        &config.model,
        build_registry(config),
        Arc::new(InMemorySessionStore::new()),
        Arc::new(InMemoryCache::new()),
        config.policy.clone(),
    ))
}
