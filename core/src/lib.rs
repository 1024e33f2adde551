pub mod agent;
pub mod config;
pub mod error;
pub mod memory;
pub mod providers;
pub mod service;
pub mod tools;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use agent::{AgentLoop, Answer, ContextBuilder, TemplateStore, ToolRegistry};
pub use config::*;
pub use error::*;
pub use memory::*;
pub use providers::*;
pub use service::{ChatService, IncomingMessage, Reply};
pub use tools::*;
pub use traits::*;
