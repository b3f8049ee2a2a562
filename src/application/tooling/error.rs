use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolInvokeError {
    #[error("MCP server '{server}' is not connected")]
    NotConnected { server: String },
    #[error("failed to spawn MCP server '{server}': {source}")]
    Spawn {
        server: String,
        #[source]
        source: std::io::Error,
    },
    #[error("MCP server '{server}' transport error: {message}")]
    Transport { server: String, message: String },
    #[error("MCP server '{server}' returned invalid JSON: {source}")]
    InvalidJson {
        server: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("MCP server '{server}' returned JSON-RPC error {code}: {message}")]
    Rpc {
        server: String,
        code: i64,
        message: String,
    },
    #[error("MCP server '{server}' terminated unexpectedly")]
    Terminated { server: String },
    #[error("MCP server '{server}' request cancelled")]
    Cancelled { server: String },
    #[error("tool '{tool}' failed: {message}")]
    Handler { tool: String, message: String },
}

impl ToolInvokeError {
    pub fn handler(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Handler {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            ToolInvokeError::NotConnected { server } => {
                format!("The tool server '{server}' is not connected.")
            }
            ToolInvokeError::Spawn { server, .. } => format!(
                "Could not start the tool server '{server}'. Check the [server] command in the configuration."
            ),
            ToolInvokeError::Terminated { server } => {
                format!("The tool server '{server}' stopped unexpectedly.")
            }
            other => other.to_string(),
        }
    }
}
