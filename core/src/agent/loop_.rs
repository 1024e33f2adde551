use crate::agent::parser::{OBSERVATION_MARKER, Step, parse_step, truncate_at_observation};
use crate::agent::{ContextBuilder, ToolRegistry, Transcript};
use crate::error::{AgentError, CompletionError};
use crate::traits::{ChatMessage, CompletionRequest, Provider};
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, debug, info, info_span, warn};

const DEFAULT_MAX_ITERATIONS: usize = 8;
const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_TOTAL_TIMEOUT: Duration = Duration::from_secs(300);

/// Consecutive unparseable responses tolerated before giving up.
const MAX_MALFORMED_RETRIES: usize = 1;

const FORMAT_REMINDER: &str = "Your last reply did not follow the format. Reply with either an \"Action:\" line and an \"Action Input:\" line, or a \"Final Answer:\" line.";

#[derive(Debug, Clone, Copy)]
pub struct LoopLimits {
    pub max_iterations: usize,
    pub model_timeout: Duration,
    pub tool_timeout: Duration,
    pub total_timeout: Duration,
}

impl Default for LoopLimits {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            model_timeout: DEFAULT_MODEL_TIMEOUT,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            total_timeout: DEFAULT_TOTAL_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolStep {
    pub tool: String,
    pub input: String,
    pub observation: String,
}

#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    /// Full transcript after each model call, oldest first.
    pub chain: Vec<String>,
    pub steps: Vec<ToolStep>,
    pub model_calls: usize,
}

enum LoopState {
    AwaitingModel,
    ToolDispatch { tool: String, input: String },
    Done(String),
}

pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    context_builder: ContextBuilder,
    tool_registry: Arc<ToolRegistry>,
    limits: LoopLimits,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        context_builder: ContextBuilder,
        tool_registry: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            provider,
            context_builder,
            tool_registry,
            limits: LoopLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: LoopLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.limits.max_iterations = max;
        self
    }

    pub fn context_builder(&self) -> &ContextBuilder {
        &self.context_builder
    }

    pub fn tool_registry(&self) -> &ToolRegistry {
        &self.tool_registry
    }

    pub async fn process(&self, question: &str) -> Result<Answer, AgentError> {
        self.process_with_history(question, &[]).await
    }

    pub async fn process_with_history(
        &self,
        question: &str,
        history: &[ChatMessage],
    ) -> Result<Answer, AgentError> {
        let run_id = uuid::Uuid::new_v4();
        let span = info_span!("question", %run_id, provider = self.provider.name());
        let total = self.limits.total_timeout;

        match tokio::time::timeout(total, self.run(question, history).instrument(span)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(%run_id, ?total, "question exceeded its time budget");
                Err(AgentError::Timeout(total))
            }
        }
    }

    async fn run(&self, question: &str, history: &[ChatMessage]) -> Result<Answer, AgentError> {
        let mut transcript =
            self.context_builder
                .build_transcript(question, history, &self.tool_registry);
        let mut steps = Vec::new();
        let mut model_calls = 0;
        let mut malformed = 0;
        let mut state = LoopState::AwaitingModel;

        info!(history = history.len(), "answering question");

        loop {
            state = match state {
                LoopState::AwaitingModel => {
                    if model_calls >= self.limits.max_iterations {
                        warn!(model_calls, "iteration budget exhausted");
                        return Err(AgentError::IterationLimit {
                            max: self.limits.max_iterations,
                        });
                    }
                    model_calls += 1;

                    let raw = self.call_model(&transcript).await?;
                    let response = truncate_at_observation(&raw);
                    debug!(model_calls, response, "model responded");

                    match parse_step(response) {
                        Ok(Step::Action { tool, input }) => {
                            transcript.push_response(response, true);
                            malformed = 0;
                            LoopState::ToolDispatch { tool, input }
                        }
                        Ok(Step::FinalAnswer(text)) => {
                            transcript.push_response(response, false);
                            LoopState::Done(text)
                        }
                        Err(_) => {
                            transcript.push_response(response, false);
                            if malformed >= MAX_MALFORMED_RETRIES {
                                warn!(model_calls, "model output still malformed, giving up");
                                return Err(AgentError::MalformedOutput {
                                    response: response.to_string(),
                                });
                            }
                            malformed += 1;
                            warn!(model_calls, "malformed model output, re-prompting");
                            transcript.push_observation(FORMAT_REMINDER);
                            LoopState::AwaitingModel
                        }
                    }
                }
                LoopState::ToolDispatch { tool, input } => {
                    let observation = self.dispatch(&tool, &input).await;
                    transcript.push_observation(&observation);
                    steps.push(ToolStep {
                        tool,
                        input,
                        observation,
                    });
                    LoopState::AwaitingModel
                }
                LoopState::Done(text) => {
                    info!(model_calls, tool_calls = steps.len(), "final answer reached");
                    return Ok(Answer {
                        text,
                        chain: transcript.into_chain(),
                        steps,
                        model_calls,
                    });
                }
            };
        }
    }

    async fn call_model(&self, transcript: &Transcript) -> Result<String, CompletionError> {
        let request = CompletionRequest {
            prompt: transcript.as_str(),
            stop: &[OBSERVATION_MARKER],
        };
        let limit = self.limits.model_timeout;

        match tokio::time::timeout(limit, self.provider.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(CompletionError::Timeout(limit)),
        }
    }

    /// Always yields an observation; failures are reported to the model.
    async fn dispatch(&self, tool: &str, input: &str) -> String {
        info!(tool, input, "dispatching tool");
        let limit = self.limits.tool_timeout;

        match tokio::time::timeout(limit, self.tool_registry.execute(tool, input)).await {
            Ok(Some(Ok(output))) => output,
            Ok(Some(Err(e))) => {
                warn!(tool, error = %e, "tool failed");
                format!("Error: {}", e)
            }
            Ok(None) => {
                warn!(tool, "model asked for an unknown tool");
                format!(
                    "Unknown tool: {}. Available tools: {}",
                    tool,
                    self.tool_registry.names().join(", ")
                )
            }
            Err(_) => {
                warn!(tool, ?limit, "tool timed out");
                format!("Tool '{}' timed out after {:?}", tool, limit)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::TemplateStore;
    use crate::testing::ScriptedProvider;
    use crate::tools::CalculatorTool;

    fn agent(provider: Arc<ScriptedProvider>) -> AgentLoop {
        let tools = ToolRegistry::new().with_tool(CalculatorTool::new());
        AgentLoop::new(
            provider,
            ContextBuilder::new(Arc::new(TemplateStore::default())),
            Arc::new(tools),
        )
    }

    #[tokio::test]
    async fn one_tool_call_then_final_answer() {
        let provider = Arc::new(ScriptedProvider::new([
            " I need to add.\nAction: calculator\nAction Input: 1+1",
            " I now know the final answer\nFinal Answer: 2",
        ]));
        let answer = agent(provider.clone()).process("What is 1+1?").await.unwrap();

        assert_eq!(answer.text, "2");
        assert_eq!(answer.steps.len(), 1);
        assert_eq!(answer.steps[0].observation, "2");
        assert_eq!(answer.model_calls, 2);
        assert_eq!(answer.chain.len(), 2);

        let prompts = provider.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].ends_with("Action Input: 1+1\nObservation: 2\nThought:"));
        assert_eq!(provider.stops(), vec!["Observation:".to_string()]);
    }

    #[tokio::test]
    async fn never_finishing_model_hits_iteration_budget() {
        let provider = Arc::new(ScriptedProvider::new([
            "Action: calculator\nAction Input: 1+1",
        ]));
        let err = agent(provider.clone())
            .with_max_iterations(3)
            .process("loop forever")
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::IterationLimit { max: 3 }));
        assert_eq!(provider.prompts().len(), 3);
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_back_to_the_model() {
        let provider = Arc::new(ScriptedProvider::new([
            "Action: weather\nAction Input: Oslo",
            "Final Answer: I cannot check the weather.",
        ]));
        let answer = agent(provider.clone()).process("Weather?").await.unwrap();

        assert_eq!(
            answer.steps[0].observation,
            "Unknown tool: weather. Available tools: calculator"
        );
        assert_eq!(answer.text, "I cannot check the weather.");
    }

    #[tokio::test]
    async fn tool_error_becomes_observation() {
        let provider = Arc::new(ScriptedProvider::new([
            "Action: calculator\nAction Input: two plus two",
            "Action: calculator\nAction Input: 2+2",
            "Final Answer: 4",
        ]));
        let answer = agent(provider).process("2+2?").await.unwrap();

        assert!(answer.steps[0].observation.starts_with("Error: could not evaluate"));
        assert_eq!(answer.steps[1].observation, "4");
        assert_eq!(answer.text, "4");
    }

    #[tokio::test]
    async fn malformed_output_is_retried_once() {
        let provider = Arc::new(ScriptedProvider::new([
            "I think the answer is 4.",
            "Final Answer: 4",
        ]));
        let answer = agent(provider.clone()).process("2+2?").await.unwrap();

        assert_eq!(answer.text, "4");
        assert!(provider.prompts()[1].contains("did not follow the format"));
    }

    #[tokio::test]
    async fn repeated_malformed_output_aborts() {
        let provider = Arc::new(ScriptedProvider::new(["no idea", "still no idea"]));
        let err = agent(provider).process("?").await.unwrap_err();
        assert!(matches!(err, AgentError::MalformedOutput { response } if response == "still no idea"));
    }

    #[tokio::test]
    async fn invented_observations_are_discarded() {
        let provider = Arc::new(ScriptedProvider::new([
            "Action: calculator\nAction Input: 3*3\nObservation: 10\nFinal Answer: 10",
            "Final Answer: 9",
        ]));
        let answer = agent(provider).process("3*3?").await.unwrap();

        assert_eq!(answer.steps[0].observation, "9");
        assert_eq!(answer.text, "9");
        assert!(!answer.chain[0].contains("Observation: 10"));
    }

    #[tokio::test]
    async fn provider_failure_propagates() {
        let provider = Arc::new(ScriptedProvider::failing());
        let err = agent(provider).process("anything").await.unwrap_err();
        assert!(matches!(err, AgentError::Completion(_)));
    }

    #[tokio::test]
    async fn slow_model_times_out() {
        let provider = Arc::new(
            ScriptedProvider::new(["Final Answer: late"]).with_delay(Duration::from_secs(5)),
        );
        let err = agent(provider)
            .with_limits(LoopLimits {
                model_timeout: Duration::from_millis(20),
                ..LoopLimits::default()
            })
            .process("hurry")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AgentError::Completion(CompletionError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn slow_tool_times_out_and_loop_continues() {
        use crate::tools::SearchTool;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"answer_box": {"answer": "Lima"}}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let provider = Arc::new(ScriptedProvider::new([
            "Action: search\nAction Input: capital of Peru",
            "Final Answer: I could not look it up.",
        ]));
        let tools = ToolRegistry::new().with_tool(SearchTool::new("key").with_base_url(server.uri()));
        let answer = AgentLoop::new(
            provider.clone(),
            ContextBuilder::new(Arc::new(TemplateStore::default())),
            Arc::new(tools),
        )
        .with_limits(LoopLimits {
            tool_timeout: Duration::from_millis(20),
            ..LoopLimits::default()
        })
        .process("Capital of Peru?")
        .await
        .unwrap();

        assert_eq!(answer.steps[0].observation, "Tool 'search' timed out after 20ms");
        assert_eq!(answer.model_calls, 2);
        assert_eq!(answer.text, "I could not look it up.");
        assert!(provider.prompts()[1].ends_with("Observation: Tool 'search' timed out after 20ms\nThought:"));
    }

    #[tokio::test]
    async fn whole_question_has_a_time_budget() {
        let provider = Arc::new(
            ScriptedProvider::new(["Final Answer: late"]).with_delay(Duration::from_secs(5)),
        );
        let err = agent(provider)
            .with_limits(LoopLimits {
                total_timeout: Duration::from_millis(20),
                ..LoopLimits::default()
            })
            .process("hurry")
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Timeout(_)));
    }
}
