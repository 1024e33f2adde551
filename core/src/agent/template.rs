use std::sync::RwLock;

pub const PLACEHOLDER_TOOLS: &str = "tools";
pub const PLACEHOLDER_TOOL_NAMES: &str = "tool_names";
pub const PLACEHOLDER_HISTORY: &str = "history";
pub const PLACEHOLDER_QUESTION: &str = "question";
pub const PLACEHOLDER_DATE: &str = "date";

pub const DEFAULT_TEMPLATE: &str = "Answer the following questions as best you can. Today is {date}. You have access to the following tools:

{tools}

Use the following format:

Question: the input question you must answer
Thought: you should always think about what to do
Action: the action to take, should be one of [{tool_names}]
Action Input: the input to the action
Observation: the result of the action
... (this Thought/Action/Action Input/Observation can repeat N times)
Thought: I now know the final answer
Final Answer: the final answer to the original input question

Begin!

{history}Question: {question}
Thought:";

const QUESTION_SUFFIX: &str = "\n\nQuestion: {question}\nThought:";

/// Values substituted into a template.
#[derive(Debug, Clone, Default)]
pub struct TemplateVars<'a> {
    pub tools: &'a str,
    pub tool_names: &'a str,
    pub history: &'a str,
    pub question: &'a str,
    pub date: &'a str,
}

impl TemplateVars<'_> {
    fn lookup(&self, name: &str) -> Option<&str> {
        match name {
            PLACEHOLDER_TOOLS => Some(self.tools),
            PLACEHOLDER_TOOL_NAMES => Some(self.tool_names),
            PLACEHOLDER_HISTORY => Some(self.history),
            PLACEHOLDER_QUESTION => Some(self.question),
            PLACEHOLDER_DATE => Some(self.date),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    text: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            text: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplate {
    /// Accepts arbitrary user text. A template that never mentions the
    /// question gets one appended, otherwise the model would never see it.
    pub fn new(text: impl Into<String>) -> Self {
        let mut text = text.into().trim().to_string();
        if !text.contains(&format!("{{{}}}", PLACEHOLDER_QUESTION)) {
            text.push_str(QUESTION_SUFFIX);
        }
        Self { text }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Single pass: substituted values are never scanned again, so a
    /// question containing `{tools}` stays literal. Unknown `{...}` are
    /// left untouched.
    pub fn render(&self, vars: &TemplateVars<'_>) -> String {
        let mut out = String::with_capacity(self.text.len() + vars.question.len());
        let mut rest = self.text.as_str();

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];

            match after.find('}') {
                Some(close) => match vars.lookup(&after[..close]) {
                    Some(value) => {
                        out.push_str(value);
                        rest = &after[close + 1..];
                    }
                    None => {
                        out.push('{');
                        rest = after;
                    }
                },
                None => {
                    out.push_str(&rest[open..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }
}

/// The process-wide active template, replaceable at runtime.
#[derive(Debug, Default)]
pub struct TemplateStore {
    current: RwLock<PromptTemplate>,
}

impl TemplateStore {
    pub fn new(template: PromptTemplate) -> Self {
        Self {
            current: RwLock::new(template),
        }
    }

    pub fn current(&self) -> PromptTemplate {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn replace(&self, template: PromptTemplate) {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = template;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars<'a>(question: &'a str) -> TemplateVars<'a> {
        TemplateVars {
            tools: "calculator: does math",
            tool_names: "calculator",
            history: "",
            question,
            date: "2024-01-01",
        }
    }

    #[test]
    fn default_template_renders_every_placeholder() {
        let rendered = PromptTemplate::default().render(&vars("What is 2+2?"));
        assert!(rendered.contains("calculator: does math"));
        assert!(rendered.contains("should be one of [calculator]"));
        assert!(rendered.contains("Today is 2024-01-01."));
        assert!(rendered.ends_with("Question: What is 2+2?\nThought:"));
        assert!(!rendered.contains("{question}"));
    }

    #[test]
    fn substituted_text_is_not_rescanned() {
        let rendered = PromptTemplate::new("Q={question}").render(&vars("print {tools}"));
        assert_eq!(rendered, "Q=print {tools}");
    }

    #[test]
    fn unknown_and_unclosed_braces_stay() {
        let template = PromptTemplate::new("{question} {unknown} {oops");
        assert_eq!(
            template.render(&vars("hi")),
            "hi {unknown} {oops"
        );
    }

    #[test]
    fn user_template_without_question_gets_suffix() {
        let template = PromptTemplate::new("  You are a pirate.  ");
        assert_eq!(
            template.as_str(),
            "You are a pirate.\n\nQuestion: {question}\nThought:"
        );
        assert!(template.render(&vars("ahoy?")).ends_with("Question: ahoy?\nThought:"));
    }

    #[test]
    fn store_replaces_template() {
        let store = TemplateStore::default();
        assert_eq!(store.current(), PromptTemplate::default());

        store.replace(PromptTemplate::new("Just answer: {question}"));
        assert_eq!(store.current().as_str(), "Just answer: {question}");
    }
}
