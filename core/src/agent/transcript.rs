use crate::agent::parser::OBSERVATION_MARKER;

/// The growing prompt of one question. Append-only.
#[derive(Debug, Clone)]
pub struct Transcript {
    text: String,
    chain: Vec<String>,
    awaiting_observation: bool,
}

impl Transcript {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            text: prompt.into(),
            chain: Vec::new(),
            awaiting_observation: false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Snapshots of the full transcript taken after every model response.
    pub fn chain(&self) -> &[String] {
        &self.chain
    }

    pub fn into_chain(self) -> Vec<String> {
        self.chain
    }

    pub fn awaiting_observation(&self) -> bool {
        self.awaiting_observation
    }

    /// `requests_action` marks the response as an unresolved `Action:` that
    /// must be answered by [`Transcript::push_observation`] first.
    pub fn push_response(&mut self, response: &str, requests_action: bool) {
        debug_assert!(
            !self.awaiting_observation,
            "model called again before the pending action was observed"
        );
        self.text.push_str(response);
        self.chain.push(self.text.clone());
        self.awaiting_observation = requests_action;
    }

    pub fn push_observation(&mut self, observation: &str) {
        if !self.text.ends_with('\n') {
            self.text.push('\n');
        }
        self.text.push_str(OBSERVATION_MARKER);
        self.text.push(' ');
        self.text.push_str(observation.trim());
        self.text.push_str("\nThought:");
        self.awaiting_observation = false;
    }
}
