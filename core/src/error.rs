use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("request to completion API failed: {0}")]
    Transport(String),

    #[error("completion API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode completion response: {0}")]
    Decode(String),

    #[error("completion API returned no text")]
    Empty,

    #[error("completion call timed out after {0:?}")]
    Timeout(Duration),
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            CompletionError::Decode(err.to_string())
        } else {
            CompletionError::Transport(err.to_string())
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("empty expression")]
    Empty,

    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("unexpected {found} at position {pos}")]
    UnexpectedToken { found: String, pos: usize },

    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("result is not a finite number")]
    NotFinite,
}

#[derive(Error, Debug)]
pub enum ToolExecutionError {
    #[error("could not evaluate expression: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("search failed: {0}")]
    Search(String),

    #[error("tool is not configured: {0}")]
    NotConfigured(String),
}

/// Failure of a whole question. Tool failures never show up here; they are
/// fed back to the model as observations.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("model output contained neither an action nor a final answer: {response:?}")]
    MalformedOutput { response: String },

    #[error("no final answer after {max} iterations")]
    IterationLimit { max: usize },

    #[error("question exceeded its time budget of {0:?}")]
    Timeout(Duration),
}

impl AgentError {
    /// Text shown to the person who asked. Details stay in the logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            AgentError::Completion(_) => {
                "Sorry, I couldn't reach the language model. Please try again later."
            }
            AgentError::MalformedOutput { .. } => "Sorry, I could not produce an answer to that.",
            AgentError::IterationLimit { .. } | AgentError::Timeout(_) => {
                "Sorry, I ran out of time working on that question."
            }
        }
    }
}
