pub mod memory;
pub mod provider;

pub use memory::{ConversationGuard, ConversationKey, ConversationMemory};
pub use provider::{ChatMessage, CompletionRequest, Provider};
