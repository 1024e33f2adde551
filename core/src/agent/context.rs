use crate::agent::template::{PromptTemplate, TemplateStore, TemplateVars};
use crate::agent::{ToolRegistry, Transcript};
use crate::traits::ChatMessage;
use std::fmt::Write;
use std::sync::Arc;

const HISTORY_MAX_CHARS: usize = 6_000;

/// Renders the opening transcript for one question.
pub struct ContextBuilder {
    templates: Arc<TemplateStore>,
}

impl ContextBuilder {
    pub fn new(templates: Arc<TemplateStore>) -> Self {
        Self { templates }
    }

    pub fn templates(&self) -> &Arc<TemplateStore> {
        &self.templates
    }

    pub fn build_transcript(
        &self,
        question: &str,
        history: &[ChatMessage],
        tools: &ToolRegistry,
    ) -> Transcript {
        let template = self.templates.current();
        Transcript::new(render_prompt(&template, question, history, tools))
    }
}

pub fn render_prompt(
    template: &PromptTemplate,
    question: &str,
    history: &[ChatMessage],
    tools: &ToolRegistry,
) -> String {
    let descriptions = tools.describe();
    let names = tools.names().join(", ");
    let history = render_history(history);
    let date = chrono::Local::now().format("%Y-%m-%d (%A)").to_string();

    template.render(&TemplateVars {
        tools: &descriptions,
        tool_names: &names,
        history: &history,
        question: question.trim(),
        date: &date,
    })
}

/// Prior turns as `Q:`/`A:` lines followed by a blank line, or nothing.
/// The oldest turns are dropped first once the text grows too long.
pub fn render_history(history: &[ChatMessage]) -> String {
    let mut lines: Vec<String> = history
        .iter()
        .filter(|m| !m.content.trim().is_empty())
        .map(|m| {
            let tag = if m.is_user() { "Q" } else { "A" };
            format!("{}: {}", tag, m.content.trim())
        })
        .collect();

    let mut total: usize = lines.iter().map(|l| l.chars().count() + 1).sum();
    while total > HISTORY_MAX_CHARS && !lines.is_empty() {
        let dropped = lines.remove(0);
        total -= dropped.chars().count() + 1;
    }

    if lines.is_empty() {
        return String::new();
    }

    let mut out = String::from("Previous conversation:\n");
    for line in lines {
        let _ = writeln!(out, "{}", line);
    }
    out.push('\n');
    out
}
