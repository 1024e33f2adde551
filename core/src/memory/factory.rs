use crate::memory::InMemoryConversations;
use crate::traits::ConversationMemory;
use std::sync::Arc;

pub fn create_memory() -> Arc<dyn ConversationMemory> {
    Arc::new(InMemoryConversations::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn factory_in_memory() {
        let mem = create_memory();
        assert_eq!(mem.name(), "in_memory");
        assert_eq!(mem.count().await, 0);
    }
}
