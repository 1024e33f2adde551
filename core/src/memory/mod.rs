pub mod factory;
pub mod in_memory;

pub use factory::create_memory;
pub use in_memory::InMemoryConversations;
