//! Conversation memory behind an explicit store interface.
//!
//! The store is a collaborator passed into the orchestrator, never a
//! process-wide singleton. Turn history is append-only per conversation;
//! durable backends implement the same trait.

use crate::types::Turn;
use grounder_core::AppResult;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Session store contract.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// All recorded turns of a conversation, oldest first.
    async fn turns(&self, conversation_id: &str) -> AppResult<Vec<Turn>>;

    /// Append a completed turn. Appends for one conversation are
    /// serialized; history is never rewritten.
    async fn append_turn(&self, conversation_id: &str, turn: Turn) -> AppResult<()>;

    /// The most recent turn, if any.
    async fn last_turn(&self, conversation_id: &str) -> AppResult<Option<Turn>> {
        Ok(self.turns(conversation_id).await?.pop())
    }
}

/// In-memory session store keyed by conversation id.
#[derive(Default)]
pub struct InMemorySessionStore {
    conversations: Mutex<HashMap<String, Vec<Turn>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn turns(&self, conversation_id: &str) -> AppResult<Vec<Turn>> {
        let conversations = self.conversations.lock().await;
        Ok(conversations
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn append_turn(&self, conversation_id: &str, turn: Turn) -> AppResult<()> {
        let mut conversations = self.conversations.lock().await;
        conversations
            .entry(conversation_id.to_string())
            .or_default()
            .push(turn);
        Ok(())
    }
}
