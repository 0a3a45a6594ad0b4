//! Advisor agent - the reason/act loop
//!
//! AWAITING ACTION → ACTION → OBSERVATION → AWAITING ACTION | FINISH
//!
//! Tool failures and unparseable model output never abort a turn; they become
//! observations or a degraded final answer. Only model/system faults
//! propagate as errors.

use crate::config::AdvisorConfig;
use crate::error::AdvisorError;
use crate::llm::{CompletionRequest, LanguageModel};
use crate::memory::MemoryStore;
use crate::models::{AgentAction, AgentFinish, AgentOutcome, AgentStep, MemoryContext};
use crate::parser::{OutputParser, ParsedStep};
use crate::prompt::{build_system_prompt, render_transcript, OBSERVATION_STOP};
use crate::tools::{ToolOutcome, ToolRegistry};
use crate::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Final answer used when the step limit ends a turn
pub const ITERATION_LIMIT_OUTPUT: &str = "Agent stopped due to iteration limit or time limit.";

const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);
const MAX_BACKOFF_EXPONENT: u32 = 6;

/// Per-turn loop state
#[derive(Debug)]
enum LoopState {
    AwaitingAction,
    Acting(AgentAction),
    Observed(AgentStep),
    Finished { finish: AgentFinish, truncated: bool },
}

/// One agent session: a fixed tool registry bound to a model and a memory store
pub struct AdvisorAgent {
    config: AdvisorConfig,
    model: Arc<dyn LanguageModel>,
    registry: ToolRegistry,
    parser: OutputParser,
    memory: Arc<dyn MemoryStore>,
    system_prompt: String,
}

impl AdvisorAgent {
    pub fn new(
        config: AdvisorConfig,
        model: Arc<dyn LanguageModel>,
        registry: ToolRegistry,
        memory: Arc<dyn MemoryStore>,
    ) -> Self {
        let parser = OutputParser::for_registry(&registry);
        let system_prompt = build_system_prompt(&registry);

        Self {
            config,
            model,
            registry,
            parser,
            memory,
            system_prompt,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Run one turn, loading the user's memory first. An unavailable store
    /// is treated as empty history.
    pub async fn run(&self, user_id: &str, input: &str) -> Result<AgentOutcome> {
        let context = match self.memory.load(user_id).await {
            Ok(context) => context,
            Err(error) => {
                warn!(
                    user_id = %user_id,
                    "Memory load failed, continuing without history: {}",
                    error
                );
                MemoryContext::default()
            }
        };

        self.run_with_context(user_id, input, &context).await
    }

    /// Run one turn against an already loaded memory context
    pub async fn run_with_context(
        &self,
        user_id: &str,
        input: &str,
        context: &MemoryContext,
    ) -> Result<AgentOutcome> {
        let start_time = Instant::now();
        let question = format!("{},{}", user_id, input);
        let chat_history = context.chat_history(Some(self.config.history_window));

        info!(
            user_id = %user_id,
            history_turns = context.turns.len(),
            has_portfolio = context.portfolio.is_some(),
            "Agent: starting turn"
        );

        let mut steps: Vec<AgentStep> = Vec::new();
        let mut iterations = 0usize;
        let mut state = LoopState::AwaitingAction;

        let (finish, truncated) = loop {
            state = match state {
                LoopState::AwaitingAction => {
                    if iterations >= self.config.max_steps {
                        warn!(
                            user_id = %user_id,
                            max_steps = self.config.max_steps,
                            "Step limit reached - forcing finish"
                        );
                        LoopState::Finished {
                            finish: AgentFinish {
                                output: ITERATION_LIMIT_OUTPUT.to_string(),
                                raw_model_text: String::new(),
                            },
                            truncated: true,
                        }
                    } else {
                        iterations += 1;
                        let transcript =
                            render_transcript(&self.system_prompt, &chat_history, &question, &steps);
                        let text = self.reason(&transcript).await?;

                        match self.parser.parse(&text) {
                            ParsedStep::Action(action) => {
                                debug!(
                                    iteration = iterations,
                                    tool_name = %action.tool_name,
                                    "Model chose action"
                                );
                                LoopState::Acting(action)
                            }
                            ParsedStep::Finish(finish) => LoopState::Finished {
                                finish,
                                truncated: false,
                            },
                        }
                    }
                }
                LoopState::Acting(action) => {
                    let step_start = Instant::now();
                    let outcome = self.act(&action).await;

                    if !outcome.is_success() {
                        warn!(
                            tool_name = %action.tool_name,
                            observation = %outcome.to_json_string(),
                            "Tool reported an error"
                        );
                    }

                    LoopState::Observed(AgentStep {
                        observation: outcome.to_json_string(),
                        action,
                        execution_time_ms: step_start.elapsed().as_millis() as u64,
                    })
                }
                LoopState::Observed(step) => {
                    debug!(
                        tool_name = %step.action.tool_name,
                        execution_time_ms = step.execution_time_ms,
                        "Observation recorded"
                    );
                    steps.push(step);
                    LoopState::AwaitingAction
                }
                LoopState::Finished { finish, truncated } => break (finish, truncated),
            };
        };

        if let Err(error) = self
            .memory
            .save(user_id, input, &finish.output, None)
            .await
        {
            warn!(
                user_id = %user_id,
                "Memory save failed, response will still be returned: {}",
                error
            );
        }

        info!(
            user_id = %user_id,
            steps = steps.len(),
            truncated = truncated,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Agent: turn complete"
        );

        Ok(AgentOutcome {
            input: input.to_string(),
            output: finish.output,
            intermediate_steps: steps,
            truncated,
        })
    }

    /// One model call with a timeout and bounded retries on transient errors
    async fn reason(&self, transcript: &str) -> Result<String> {
        let request = CompletionRequest::new(transcript, self.config.temperature)
            .with_stop(OBSERVATION_STOP);
        let mut attempt: u32 = 0;

        loop {
            let result = match tokio::time::timeout(
                self.config.model_timeout,
                self.model.complete(&request),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(AdvisorError::Timeout(format!(
                    "{} model call exceeded {:?}",
                    self.model.name(),
                    self.config.model_timeout
                ))),
            };

            match result {
                Ok(text) => return Ok(text),
                Err(error) if attempt < self.config.model_retries && is_transient(&error) => {
                    attempt += 1;
                    let delay = retry_delay(attempt);
                    warn!(
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Model call failed, retrying: {}",
                        error
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Invoke the named tool. Unknown tools and timeouts become error outcomes.
    async fn act(&self, action: &AgentAction) -> ToolOutcome {
        let Some(tool) = self.registry.get(&action.tool_name) else {
            return ToolOutcome::failure(format!(
                "{} is not a valid tool, try one of [{}].",
                action.tool_name,
                self.registry.list().join(", ")
            ));
        };

        match tokio::time::timeout(self.config.tool_timeout, tool.invoke(&action.tool_input)).await
        {
            Ok(outcome) => outcome,
            Err(_) => ToolOutcome::failure(format!(
                "{} timed out after {:?}",
                action.tool_name, self.config.tool_timeout
            )),
        }
    }
}

/// Exponential backoff, doubling from the base delay up to a fixed ceiling
fn retry_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
    RETRY_BASE_DELAY * 2u32.pow(exponent)
}

fn is_transient(error: &AdvisorError) -> bool {
    matches!(
        error,
        AdvisorError::LlmError(_) | AdvisorError::Timeout(_) | AdvisorError::HttpError(_)
    )
}
