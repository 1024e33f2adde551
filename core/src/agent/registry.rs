use crate::config::Config;
use crate::error::ToolExecutionError;
use crate::tools::{BuiltinTool, CalculatorTool, SearchTool};

/// Fixed set of tools, built once at startup.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<BuiltinTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Search is left out when it is disabled or has no API key.
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new();

        if config.search.enabled {
            match config.search.resolve_api_key() {
                Some(api_key) => {
                    let mut search = SearchTool::new(api_key);
                    if let Some(base_url) = &config.search.base_url {
                        search = search.with_base_url(base_url.clone());
                    }
                    registry = registry.with_tool(search);
                }
                None => tracing::warn!("no search API key configured, search tool disabled"),
            }
        }

        registry.with_tool(CalculatorTool::new())
    }

    /// A later tool with the same name replaces the earlier one.
    pub fn with_tool(mut self, tool: impl Into<BuiltinTool>) -> Self {
        let tool = tool.into();
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<&BuiltinTool> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// One `name: description` line per tool, in registration order.
    pub fn describe(&self) -> String {
        self.tools
            .iter()
            .map(|t| format!("{}: {}", t.name(), t.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// `None` when no tool has that name.
    pub async fn execute(
        &self,
        name: &str,
        input: &str,
    ) -> Option<Result<String, ToolExecutionError>> {
        let tool = self.get(name)?;
        Some(tool.execute(input).await)
    }
}
