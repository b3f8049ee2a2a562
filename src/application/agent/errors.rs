use crate::model::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("agent exceeded the maximum of {0} tool rounds")]
    ToolRoundLimit(usize),
}

impl AgentError {
    pub fn user_message(&self) -> String {
        match self {
            AgentError::Model(err) => err.user_message(),
            AgentError::ToolRoundLimit(limit) => format!(
                "The assistant kept requesting tools after {limit} rounds and was stopped. Try rephrasing the request."
            ),
        }
    }
}
