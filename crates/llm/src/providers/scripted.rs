//! Scripted LLM client for deterministic tests.
//!
//! Pipeline tests need to exercise the orchestrator's control flow without a
//! live model. The scripted client replays a queue of canned replies (or
//! injected failures) in order and records every request it sees.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use grounder_core::{AppError, AppResult};
use std::collections::VecDeque;
use std::sync::Mutex;

/// A single canned reply.
#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Timeout,
    Unavailable,
    Malformed(String),
}

/// Deterministic LLM client replaying a scripted sequence of replies.
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<LlmRequest>>,
}

impl ScriptedClient {
    /// Create an empty scripted client. A call with no remaining reply
    /// fails with an `Llm` error so tests notice script exhaustion.
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful text reply.
    pub fn push_text(&self, text: impl Into<String>) {
        self.replies.lock().unwrap().push_back(Reply::Text(text.into()));
    }

    /// Queue a deadline expiry.
    pub fn push_timeout(&self) {
        self.replies.lock().unwrap().push_back(Reply::Timeout);
    }

    /// Queue an unreachable-backend failure.
    pub fn push_unavailable(&self) {
        self.replies.lock().unwrap().push_back(Reply::Unavailable);
    }

    /// Queue a reply that will not satisfy any JSON contract.
    pub fn push_malformed(&self, text: impl Into<String>) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Reply::Malformed(text.into()));
    }

    /// Requests seen so far, in order.
    pub fn calls(&self) -> Vec<LlmRequest> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of completions served.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Default for ScriptedClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedClient {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.calls.lock().unwrap().push(request.clone());

        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AppError::Llm("Scripted client exhausted".to_string()))?;

        match reply {
            Reply::Text(text) | Reply::Malformed(text) => Ok(LlmResponse {
                content: text,
                model: request.model.clone(),
                usage: LlmUsage::new(0, 0),
            }),
            Reply::Timeout => Err(AppError::LlmTimeout("scripted timeout".to_string())),
            Reply::Unavailable => {
                Err(AppError::LlmUnavailable("scripted outage".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replies_in_order() {
        let client = ScriptedClient::new();
        client.push_text("first");
        client.push_text("second");

        let request = LlmRequest::new("hi", "test-model");
        assert_eq!(client.complete(&request).await.unwrap().content, "first");
        assert_eq!(client.complete(&request).await.unwrap().content, "second");
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_script_errors() {
        let client = ScriptedClient::new();
        let request = LlmRequest::new("hi", "test-model");
        assert!(matches!(
            client.complete(&request).await,
            Err(AppError::Llm(_))
        ));
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let client = ScriptedClient::new();
        client.push_timeout();
        client.push_unavailable();

        let request = LlmRequest::new("hi", "test-model");
        assert!(client.complete(&request).await.unwrap_err().is_llm_timeout());
        assert!(client.complete(&request).await.unwrap_err().is_fatal());
    }
}
