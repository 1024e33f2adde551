pub mod calculator;
pub mod search;

pub use calculator::CalculatorTool;
pub use search::SearchTool;

use crate::error::ToolExecutionError;

/// Every capability the model can call.
pub enum BuiltinTool {
    Search(SearchTool),
    Calculator(CalculatorTool),
}

impl BuiltinTool {
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinTool::Search(_) => search::NAME,
            BuiltinTool::Calculator(_) => calculator::NAME,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            BuiltinTool::Search(_) => search::DESCRIPTION,
            BuiltinTool::Calculator(_) => calculator::DESCRIPTION,
        }
    }

    pub async fn execute(&self, input: &str) -> Result<String, ToolExecutionError> {
        match self {
            BuiltinTool::Search(tool) => tool.execute(input).await,
            BuiltinTool::Calculator(tool) => tool.execute(input),
        }
    }
}

impl From<SearchTool> for BuiltinTool {
    fn from(tool: SearchTool) -> Self {
        BuiltinTool::Search(tool)
    }
}

impl From<CalculatorTool> for BuiltinTool {
    fn from(tool: CalculatorTool) -> Self {
        BuiltinTool::Calculator(tool)
    }
}
