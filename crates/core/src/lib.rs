//! Grounder Core Library
//!
//! This crate provides the foundational utilities for the Grounder pipeline:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management, including the pipeline policy constants

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{AppConfig, PipelinePolicy, SearchConfig};
pub use error::{AppError, AppResult};
