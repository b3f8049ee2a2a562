use crate::config::{DEFAULT_MODEL, DEFAULT_SYSTEM_PROMPT};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub struct AgentStep {
    pub tool: String,
    pub tool_use_id: String,
    pub input: Value,
    pub success: bool,
    pub output: Value,
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub session_id: String,
    pub response: String,
    pub steps: Vec<AgentStep>,
}

#[derive(Debug, Clone)]
pub struct AgentOptions {
    pub model: String,
    pub system_prompt: String,
    /// Keep the conversation across prompts instead of starting fresh.
    pub retain_history: bool,
    /// Upper bound on model→tools round trips per prompt; `None` lets the
    /// model decide when to stop.
    pub max_tool_rounds: Option<usize>,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            retain_history: true,
            max_tool_rounds: None,
        }
    }
}
