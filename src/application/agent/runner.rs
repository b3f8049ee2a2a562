use super::errors::AgentError;
use super::execution::execute_tool;
use super::models::{AgentOptions, AgentOutcome, AgentStep};
use super::session::AgentSession;
use crate::model::{ModelProvider, ModelRequest};
use crate::types::{ChatMessage, ToolUse};
use tracing::{debug, info, warn};

/// Where one prompt cycle currently stands.
enum LoopState {
    AwaitingModel,
    ExecutingTools(Vec<ToolUse>),
    Done(String),
    Failed(AgentError),
}

pub struct Agent<P: ModelProvider> {
    provider: P,
    options: AgentOptions,
}

impl<P: ModelProvider> Agent<P> {
    pub fn new(provider: P, options: AgentOptions) -> Self {
        Self { provider, options }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Drives one user prompt to a final answer, executing every tool the
    /// model asks for along the way.
    ///
    /// The session history is only updated when the cycle reaches a final
    /// answer. A failed cycle, or a future dropped mid-cycle, leaves it as it
    /// was before the call.
    pub async fn respond_to(
        &self,
        session: &mut AgentSession,
        prompt: &str,
    ) -> Result<AgentOutcome, AgentError> {
        if !self.options.retain_history {
            session.clear_history();
        }

        let system_prompt = self.compose_system_prompt(session);
        let tools = session.registry().tool_specs();
        let mut transcript = session.history().to_vec();
        transcript.push(ChatMessage::user(prompt));

        info!(
            session_id = session.id(),
            tools = tools.len(),
            history = transcript.len(),
            "Agent run started"
        );

        let mut steps: Vec<AgentStep> = Vec::new();
        let mut rounds = 0usize;
        let mut state = LoopState::AwaitingModel;

        loop {
            state = match state {
                LoopState::AwaitingModel => {
                    debug!(
                        session_id = session.id(),
                        messages = transcript.len(),
                        "Submitting conversation to model provider"
                    );
                    let request = ModelRequest {
                        model: self.options.model.clone(),
                        system_prompt: Some(system_prompt.clone()),
                        messages: transcript.clone(),
                        tools: tools.clone(),
                    };
                    match self.provider.converse(request).await {
                        Ok(response) => {
                            debug!(
                                stop_reason = response.stop_reason.as_deref(),
                                "Model responded"
                            );
                            let next = if response.wants_tools() {
                                LoopState::ExecutingTools(
                                    response.message.tool_uses().cloned().collect(),
                                )
                            } else {
                                LoopState::Done(response.message.text_content())
                            };
                            transcript.push(response.message);
                            next
                        }
                        Err(err) => LoopState::Failed(err.into()),
                    }
                }
                LoopState::ExecutingTools(requests) => {
                    rounds += 1;
                    match self.options.max_tool_rounds {
                        Some(limit) if rounds > limit => {
                            LoopState::Failed(AgentError::ToolRoundLimit(limit))
                        }
                        _ => {
                            info!(
                                round = rounds,
                                requested = requests.len(),
                                "Model requested tool execution"
                            );
                            for request in requests {
                                let (result, step) =
                                    execute_tool(session.registry(), request).await;
                                transcript.push(ChatMessage::tool_result(result));
                                steps.push(step);
                            }
                            LoopState::AwaitingModel
                        }
                    }
                }
                LoopState::Done(response) => {
                    session.commit(transcript);
                    info!(
                        session_id = session.id(),
                        steps = steps.len(),
                        "Agent returned final response"
                    );
                    return Ok(AgentOutcome {
                        session_id: session.id().to_string(),
                        response,
                        steps,
                    });
                }
                LoopState::Failed(err) => {
                    warn!(session_id = session.id(), %err, "Agent run failed");
                    return Err(err);
                }
            };
        }
    }

    fn compose_system_prompt(&self, session: &AgentSession) -> String {
        match session.server_instructions() {
            Some(instructions) => format!(
                "{}\n\n{}",
                self.options.system_prompt.trim_end(),
                instructions.trim()
            ),
            None => self.options.system_prompt.clone(),
        }
    }
}
