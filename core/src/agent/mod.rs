pub mod context;
pub mod loop_;
pub mod parser;
pub mod registry;
pub mod template;
pub mod transcript;

pub use context::ContextBuilder;
pub use loop_::{AgentLoop, Answer, LoopLimits, ToolStep};
pub use parser::{MalformedModelOutput, Step, parse_step};
pub use registry::ToolRegistry;
pub use template::{DEFAULT_TEMPLATE, PromptTemplate, TemplateStore};
pub use transcript::Transcript;
