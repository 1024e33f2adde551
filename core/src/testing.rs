//! Test doubles shared by unit tests across the crate.

use crate::error::CompletionError;
use crate::traits::{CompletionRequest, Provider};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Replays canned responses in order, repeating the last one forever.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<String>>,
    last: Mutex<Option<String>>,
    prompts: Mutex<Vec<String>>,
    stops: Mutex<Vec<String>>,
    delay: Option<Duration>,
    fail: bool,
}

impl ScriptedProvider {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            last: Mutex::new(None),
            prompts: Mutex::new(Vec::new()),
            stops: Mutex::new(Vec::new()),
            delay: None,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        let mut provider = Self::new(Vec::<String>::new());
        provider.fail = true;
        provider
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn stops(&self) -> Vec<String> {
        self.stops.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, CompletionError> {
        self.prompts.lock().unwrap().push(request.prompt.to_string());
        *self.stops.lock().unwrap() = request.stop.iter().map(|s| s.to_string()).collect();

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail {
            return Err(CompletionError::Status {
                status: 500,
                body: "scripted failure".to_string(),
            });
        }

        let next = self.responses.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(next) = next {
            *last = Some(next);
        }
        last.clone().ok_or(CompletionError::Empty)
    }
}
