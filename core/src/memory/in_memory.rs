use crate::traits::memory::new_slot;
use crate::traits::{ChatMessage, ConversationGuard, ConversationKey, ConversationMemory};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type Slot = Arc<tokio::sync::Mutex<Vec<ChatMessage>>>;

/// Process-lifetime conversation store. The outer map lock is only held
/// long enough to find a key's slot; each slot has its own async lock.
pub struct InMemoryConversations {
    slots: Mutex<HashMap<ConversationKey, Slot>>,
}

impl Default for InMemoryConversations {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryConversations {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, key: &ConversationKey) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.entry(key.clone()).or_insert_with(new_slot).clone()
    }
}

#[async_trait]
impl ConversationMemory for InMemoryConversations {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn lock(&self, key: &ConversationKey) -> ConversationGuard {
        self.slot(key).lock_owned().await
    }

    /// Drops the key's slot too, unless another task is still holding it.
    async fn forget(&self, key: &ConversationKey) -> bool {
        let slot = self.slot(key);
        let mut history = slot.lock().await;
        let had_any = !history.is_empty();
        history.clear();

        // checked under the history lock: one reference in the map, one here
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        if slots.get(key).is_some_and(|s| Arc::ptr_eq(s, &slot)) && Arc::strong_count(&slot) == 2 {
            slots.remove(key);
        }
        had_any
    }

    async fn count(&self) -> usize {
        let slots: Vec<Slot> = {
            let map = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            map.values().cloned().collect()
        };

        let mut non_empty = 0;
        for slot in slots {
            if !slot.lock().await.is_empty() {
                non_empty += 1;
            }
        }
        non_empty
    }
}
