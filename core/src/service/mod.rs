pub mod commands;

pub use commands::{Command, parse_command};

use crate::agent::{AgentLoop, Answer, PromptTemplate};
use crate::traits::{ChatMessage, ConversationKey, ConversationMemory};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub user_id: String,
    pub channel_id: String,
    pub text: String,
}

impl IncomingMessage {
    pub fn new(
        user_id: impl Into<String>,
        channel_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            channel_id: channel_id.into(),
            text: text.into(),
        }
    }

    pub fn key(&self) -> ConversationKey {
        ConversationKey::new(&self.user_id, &self.channel_id)
    }
}

#[derive(Debug, Clone)]
pub enum Reply {
    Forgotten,
    Template(String),
    PromptChangeDenied,
    EmptyPrompt,
    Answer(Answer),
    Failure(String),
}

impl Reply {
    pub fn text(&self) -> String {
        match self {
            Reply::Forgotten => "I've forgotten all history.".to_string(),
            Reply::Template(template) => format!("Current prompt: {}", template),
            Reply::PromptChangeDenied => "You are not allowed to change the prompt.".to_string(),
            Reply::EmptyPrompt => "I can't use an empty prompt, it returns garbage.".to_string(),
            Reply::Answer(answer) => answer.text.clone(),
            Reply::Failure(message) => message.clone(),
        }
    }
}

/// Front door for chat front-ends: commands, history and the loop.
pub struct ChatService {
    agent: AgentLoop,
    memory: Arc<dyn ConversationMemory>,
    prompt_editors: Vec<String>,
}

impl ChatService {
    pub fn new(agent: AgentLoop, memory: Arc<dyn ConversationMemory>) -> Self {
        Self {
            agent,
            memory,
            prompt_editors: Vec::new(),
        }
    }

    /// Restricts `+prompt` changes to these user ids. Empty allows everyone.
    pub fn with_prompt_editors(mut self, editors: Vec<String>) -> Self {
        self.prompt_editors = editors;
        self
    }

    pub fn memory(&self) -> &Arc<dyn ConversationMemory> {
        &self.memory
    }

    pub async fn handle(&self, message: &IncomingMessage) -> Reply {
        let key = message.key();

        match parse_command(&message.text) {
            Command::Forget => {
                let had_history = self.memory.forget(&key).await;
                info!(%key, had_history, "conversation forgotten");
                Reply::Forgotten
            }
            Command::SetPrompt(new_template) => self.set_prompt(message, new_template),
            Command::Empty => Reply::EmptyPrompt,
            Command::Ask(question) => self.ask(&key, question).await,
        }
    }

    fn set_prompt(&self, message: &IncomingMessage, new_template: Option<&str>) -> Reply {
        let templates = self.agent.context_builder().templates();

        if let Some(text) = new_template {
            if !self.may_edit_prompt(&message.user_id) {
                warn!(user = %message.user_id, "prompt change refused");
                return Reply::PromptChangeDenied;
            }
            templates.replace(PromptTemplate::new(text));
            info!(user = %message.user_id, "prompt template replaced");
        }

        Reply::Template(templates.current().as_str().to_string())
    }

    fn may_edit_prompt(&self, user_id: &str) -> bool {
        self.prompt_editors.is_empty() || self.prompt_editors.iter().any(|u| u == user_id)
    }

    async fn ask(&self, key: &ConversationKey, question: &str) -> Reply {
        // held for the whole question so a user's questions answer in order
        let mut conversation = self.memory.lock(key).await;

        match self.agent.process_with_history(question, &conversation).await {
            Ok(answer) => {
                conversation.push(ChatMessage::user(question));
                conversation.push(ChatMessage::assistant(answer.text.clone()));
                Reply::Answer(answer)
            }
            Err(e) => {
                error!(%key, question, error = %e, "failed to answer question");
                Reply::Failure(e.user_message().to_string())
            }
        }
    }
}
