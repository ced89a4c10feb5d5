//! Grounder Retrieval Library
//!
//! This crate provides the evidence-gathering half of the pipeline:
//! - The `Provider` capability trait and registry
//! - Provider adapters (web, shopping, hotels, plus a stub for tests)
//! - The retrieval planner (first pass and critique-driven refinement)
//! - Concurrent plan execution with per-call and overall deadlines
//! - The merge/dedup/rerank engine

pub mod fanout;
pub mod merge;
pub mod planner;
pub mod provider;
pub mod providers;
pub mod types;

// Re-export commonly used types
pub use fanout::CallOutcome;
pub use merge::merge;
pub use planner::{build_plan, refine_plan, PlanPass, PlannedCall, RetrievalPlan};
pub use provider::{Provider, ProviderRegistry};
pub use types::{
    filter_keys, Chunk, Filters, GroundingMode, Intent, MergedResult, ProviderFailure,
    ProviderResult, RankedChunk,
};
