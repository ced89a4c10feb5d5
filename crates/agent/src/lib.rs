//! Grounder Agent Library
//!
//! This crate is the agentic query pipeline: the stage sequence from raw
//! query to final answer.
//! - Session memory and follow-up context resolution
//! - Query understanding and the clarification gate
//! - The grounding-mode decision
//! - Stage-output caching
//! - Synthesis with citations and degraded fallbacks
//! - The bounded critique/refinement loop
//! - The orchestrator tying the stages together

pub mod cache;
pub mod context;
pub mod critique;
pub mod grounding;
pub mod orchestrator;
pub mod session;
pub mod synthesis;
pub mod types;
pub mod understand;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use cache::{Cache, InMemoryCache};
pub use orchestrator::Orchestrator;
pub use session::{InMemorySessionStore, SessionStore};
pub use types::{Answer, Citation, ClarificationRequest, PipelineOutcome, Query, Turn};
