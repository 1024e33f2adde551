use crate::traits::ChatMessage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Identity of one conversation: a user talking in a channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationKey {
    pub user_id: String,
    pub channel_id: String,
}

impl ConversationKey {
    pub fn new(user_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            channel_id: channel_id.into(),
        }
    }
}

impl std::fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.user_id, self.channel_id)
    }
}

pub type ConversationGuard = OwnedMutexGuard<Vec<ChatMessage>>;

#[async_trait]
pub trait ConversationMemory: Send + Sync {
    fn name(&self) -> &str;

    /// Exclusive access to one conversation. Holders for the same key are
    /// served in the order they asked.
    async fn lock(&self, key: &ConversationKey) -> ConversationGuard;

    async fn append(&self, key: &ConversationKey, message: ChatMessage) {
        self.lock(key).await.push(message);
    }

    async fn history(&self, key: &ConversationKey) -> Vec<ChatMessage> {
        self.lock(key).await.clone()
    }

    /// Clears the conversation. Returns whether anything was stored.
    async fn forget(&self, key: &ConversationKey) -> bool {
        let mut guard = self.lock(key).await;
        let had_any = !guard.is_empty();
        guard.clear();
        had_any
    }

    async fn count(&self) -> usize;
}

pub(crate) fn new_slot() -> Arc<Mutex<Vec<ChatMessage>>> {
    Arc::new(Mutex::new(Vec::new()))
}
