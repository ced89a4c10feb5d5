//! Grounder LLM Library
//!
//! This crate provides the language-model capability for the Grounder
//! pipeline:
//! - `LlmClient` trait and request/response types
//! - Structured-output extraction from model text
//! - Provider implementations (Ollama, plus a scripted client for tests)
//! - A provider factory keyed by configuration

pub mod client;
pub mod factory;
pub mod providers;
pub mod structured;

// Re-export commonly used types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use providers::{OllamaClient, ScriptedClient};
pub use structured::parse_structured;
