//! Error types for the Grounder pipeline.
//!
//! This module defines a unified error enum covering all error categories in
//! the application: configuration, I/O, language-model calls, retrieval,
//! session handling, and serialization.
//!
//! Most retrieval-side failures are *not* represented here: provider timeouts
//! and outages are ordinary data (`ProviderFailure`) that the pipeline
//! recovers from by proceeding with partial results. `AppError` is reserved
//! for failures that a stage cannot absorb.

use thiserror::Error;

/// Unified error type for the Grounder pipeline.
///
/// All fallible functions in the workspace return `Result<T, AppError>`.
/// We never panic; errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Language-model call failed (rejected request, malformed payload)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Language-model call exceeded its deadline.
    ///
    /// Kept separate from [`AppError::Llm`] so callers can apply their
    /// deterministic fallback policy on timeouts specifically.
    #[error("LLM timeout: {0}")]
    LlmTimeout(String),

    /// The language-model capability cannot be reached at all.
    ///
    /// This is the only failure that is fatal to a request; every other
    /// failure mode degrades the answer instead of aborting.
    #[error("LLM unavailable: {0}")]
    LlmUnavailable(String),

    /// Retrieval planning and merging errors
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Session and conversation-memory errors
    #[error("Session error: {0}")]
    Session(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether this error may abort a request outright.
    ///
    /// Per the error-handling policy, only an unreachable language-model
    /// capability is fatal; everything else degrades.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::LlmUnavailable(_))
    }

    /// Whether this error is a language-model deadline expiry.
    pub fn is_llm_timeout(&self) -> bool {
        matches!(self, AppError::LlmTimeout(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unavailable_is_fatal() {
        assert!(AppError::LlmUnavailable("connection refused".into()).is_fatal());
        assert!(!AppError::Llm("bad response".into()).is_fatal());
        assert!(!AppError::LlmTimeout("4s elapsed".into()).is_fatal());
        assert!(!AppError::Retrieval("no providers".into()).is_fatal());
    }

    #[test]
    fn test_timeout_classification() {
        assert!(AppError::LlmTimeout("deadline".into()).is_llm_timeout());
        assert!(!AppError::Llm("other".into()).is_llm_timeout());
    }
}
