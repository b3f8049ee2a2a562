use crate::domain::schema::ToolSpec;
use crate::types::{ChatMessage, ContentBlock, MessageRole, ToolUse};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

const OLLAMA_PROVIDER: &str = "ollama";

#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub model: String,
    pub system_prompt: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSpec>,
}

#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub message: ChatMessage,
    pub stop_reason: Option<String>,
}

impl ModelResponse {
    pub fn wants_tools(&self) -> bool {
        self.message.tool_uses().next().is_some()
    }
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("network error calling provider '{provider}': {source}")]
    Network {
        provider: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("provider '{provider}' returned invalid response: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

impl ModelError {
    pub fn network(provider: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            provider: provider.into(),
            source,
        }
    }

    pub fn invalid_response(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            ModelError::Network { provider, source } => {
                if source.is_connect() {
                    format!("Could not connect to the model provider '{provider}'. Is it running?")
                } else if source.is_timeout() {
                    format!("The request to '{provider}' timed out. Try again shortly.")
                } else if let Some(status) = source.status() {
                    match status {
                        StatusCode::NOT_FOUND => format!(
                            "The '{provider}' endpoint or model was not found (404). Check the configured model."
                        ),
                        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                            format!("The provider '{provider}' rejected the credentials.")
                        }
                        StatusCode::TOO_MANY_REQUESTS => {
                            format!("The provider '{provider}' is rate limiting requests.")
                        }
                        StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => {
                            format!("The provider '{provider}' is currently unavailable.")
                        }
                        _ => format!(
                            "The request to '{provider}' failed with status {}.",
                            status.as_u16()
                        ),
                    }
                } else {
                    format!("Network error while calling '{provider}'.")
                }
            }
            ModelError::InvalidResponse { provider, .. } => {
                format!("The provider '{provider}' returned a response that could not be processed.")
            }
        }
    }
}

#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn converse(&self, request: ModelRequest) -> Result<ModelResponse, ModelError>;
}

#[derive(Clone)]
pub struct OllamaClient {
    http: Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ModelError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ModelError::network(OLLAMA_PROVIDER, source))?;
        Ok(Self::with_client(base_url, client))
    }

    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            http: client,
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        let trimmed = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{trimmed}/{path}")
    }
}

#[async_trait]
impl ModelProvider for OllamaClient {
    async fn converse(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        let url = self.endpoint("/api/chat");
        let payload = OllamaChatRequest::from(&request);
        info!(
            model = request.model.as_str(),
            url = %url,
            messages = payload.messages.len(),
            tools = payload.tools.len(),
            "Sending request to model provider"
        );
        let response: OllamaChatResponse = self
            .http
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|source| ModelError::network(OLLAMA_PROVIDER, source))?
            .error_for_status()
            .map_err(|source| ModelError::network(OLLAMA_PROVIDER, source))?
            .json()
            .await
            .map_err(|source| ModelError::network(OLLAMA_PROVIDER, source))?;
        debug!("Received response from model provider");

        response.into_model_response()
    }
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OllamaTool>,
    stream: bool,
}

impl From<&ModelRequest> for OllamaChatRequest {
    fn from(value: &ModelRequest) -> Self {
        let mut messages = Vec::with_capacity(value.messages.len() + 1);
        if let Some(system) = value.system_prompt.as_deref().filter(|s| !s.trim().is_empty()) {
            messages.push(OllamaChatMessage::plain(MessageRole::System, system));
        }

        // Ollama names tool results by tool, not by call id.
        let mut tool_names: HashMap<&str, &str> = HashMap::new();
        for message in &value.messages {
            match message.role {
                MessageRole::Tool => {
                    for result in message.tool_results() {
                        messages.push(OllamaChatMessage {
                            role: MessageRole::Tool.as_str().to_string(),
                            content: result.content_text(),
                            tool_calls: Vec::new(),
                            tool_name: tool_names
                                .get(result.tool_use_id.as_str())
                                .map(|name| name.to_string()),
                        });
                    }
                }
                role => {
                    let tool_calls: Vec<OllamaToolCall> = message
                        .tool_uses()
                        .map(|tool_use| {
                            tool_names.insert(tool_use.tool_use_id.as_str(), tool_use.name.as_str());
                            OllamaToolCall {
                                id: Some(tool_use.tool_use_id.clone()),
                                function: OllamaFunctionCall {
                                    name: tool_use.name.clone(),
                                    arguments: tool_use.input.clone(),
                                },
                            }
                        })
                        .collect();
                    messages.push(OllamaChatMessage {
                        role: role.as_str().to_string(),
                        content: message.text_content(),
                        tool_calls,
                        tool_name: None,
                    });
                }
            }
        }

        Self {
            model: value.model.clone(),
            messages,
            tools: value.tools.iter().map(OllamaTool::from).collect(),
            stream: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaChatMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<OllamaToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
}

impl OllamaChatMessage {
    fn plain(role: MessageRole, content: &str) -> Self {
        Self {
            role: role.as_str().to_string(),
            content: content.to_string(),
            tool_calls: Vec::new(),
            tool_name: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    function: OllamaFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaFunctionCall {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Serialize)]
struct OllamaTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: OllamaFunction,
}

#[derive(Debug, Serialize)]
struct OllamaFunction {
    name: String,
    description: String,
    parameters: Value,
}

impl From<&ToolSpec> for OllamaTool {
    fn from(spec: &ToolSpec) -> Self {
        Self {
            kind: "function",
            function: OllamaFunction {
                name: spec.name.clone(),
                description: spec.description.clone(),
                parameters: serde_json::to_value(&spec.input_schema.json)
                    .unwrap_or_else(|_| Value::Object(Default::default())),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaChatMessage>,
    #[serde(default)]
    done_reason: Option<String>,
}

impl OllamaChatResponse {
    fn into_model_response(self) -> Result<ModelResponse, ModelError> {
        let message = self
            .message
            .ok_or_else(|| ModelError::invalid_response(OLLAMA_PROVIDER, "missing message field"))?;

        let role = MessageRole::from_str(message.role.as_str()).ok_or_else(|| {
            ModelError::invalid_response(OLLAMA_PROVIDER, "unknown role in response")
        })?;

        let mut content = Vec::with_capacity(message.tool_calls.len() + 1);
        if !message.content.trim().is_empty() {
            content.push(ContentBlock::Text(message.content));
        }
        for call in message.tool_calls {
            content.push(ContentBlock::ToolUse(ToolUse {
                tool_use_id: call
                    .id
                    .filter(|id| !id.is_empty())
                    .unwrap_or_else(|| format!("tooluse_{}", Uuid::new_v4().simple())),
                name: call.function.name,
                input: match call.function.arguments {
                    Value::Null => Value::Object(Default::default()),
                    other => other,
                },
            }));
        }

        Ok(ModelResponse {
            message: ChatMessage::new(role, content),
            stop_reason: self.done_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schema::{ToolInputSchema, normalize};
    use crate::types::ToolResult;
    use serde_json::json;

    #[test]
    fn endpoint_joins_paths_correctly() {
        let client = OllamaClient::new("http://localhost:11434/");
        assert_eq!(
            client.endpoint("/api/chat"),
            "http://localhost:11434/api/chat"
        );
    }

    #[test]
    fn request_conversion_maps_tool_traffic() {
        let request = ModelRequest {
            model: "llama3.1".into(),
            system_prompt: Some("use tools".into()),
            messages: vec![
                ChatMessage::user("how many rows?"),
                ChatMessage::new(
                    MessageRole::Assistant,
                    vec![ContentBlock::ToolUse(ToolUse {
                        tool_use_id: "call-1".into(),
                        name: "read_query".into(),
                        input: json!({"query": "select count(*) from t"}),
                    })],
                ),
                ChatMessage::tool_result(ToolResult::success("call-1", json!("42"))),
            ],
            tools: vec![ToolSpec {
                name: "read_query".into(),
                description: "Run a SELECT".into(),
                input_schema: ToolInputSchema::from(normalize(Some(&json!({
                    "properties": {"query": {"type": "string"}},
                    "required": ["query"]
                })))),
            }],
        };

        let payload = serde_json::to_value(OllamaChatRequest::from(&request)).expect("serialize");
        let roles: Vec<_> = payload["messages"]
            .as_array()
            .expect("messages")
            .iter()
            .map(|m| m["role"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "tool"]);
        assert_eq!(
            payload["messages"][2]["tool_calls"][0]["function"]["name"],
            "read_query"
        );
        assert_eq!(payload["messages"][3]["content"], "42");
        assert_eq!(payload["messages"][3]["tool_name"], "read_query");
        assert_eq!(payload["tools"][0]["type"], "function");
        assert_eq!(
            payload["tools"][0]["function"]["parameters"]["required"],
            json!(["query"])
        );
        assert_eq!(payload["stream"], false);
    }

    #[test]
    fn response_with_tool_calls_becomes_tool_use_blocks() {
        let raw: OllamaChatResponse = serde_json::from_value(json!({
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [
                    {"function": {"name": "list_tables", "arguments": {}}},
                    {"function": {"name": "read_query", "arguments": {"query": "select 1"}}}
                ]
            },
            "done_reason": "stop"
        }))
        .expect("decode");

        let response = raw.into_model_response().expect("convert");
        assert!(response.wants_tools());
        let uses: Vec<_> = response.message.tool_uses().collect();
        assert_eq!(uses.len(), 2);
        assert_eq!(uses[0].name, "list_tables");
        assert_eq!(uses[1].input, json!({"query": "select 1"}));
        assert_ne!(uses[0].tool_use_id, uses[1].tool_use_id);
        assert!(uses[0].tool_use_id.starts_with("tooluse_"));
        assert_eq!(response.stop_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn response_without_message_is_invalid() {
        let raw: OllamaChatResponse = serde_json::from_value(json!({"done": true})).expect("decode");
        let err = raw.into_model_response().expect_err("missing message");
        assert!(matches!(err, ModelError::InvalidResponse { .. }));
    }
}
