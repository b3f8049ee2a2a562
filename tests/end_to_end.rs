// End-to-end tests: a scripted MCP server process, discovery, and the
// conversation loop driven by a scripted model.
#![cfg(unix)]

use async_trait::async_trait;
use mcp_converse_agent::agent::{Agent, AgentOptions, AgentSession};
use mcp_converse_agent::config::ServerConfig;
use mcp_converse_agent::model::{ModelError, ModelProvider, ModelRequest, ModelResponse};
use mcp_converse_agent::tooling::{HELP_TOOL_NAME, HELP_TOOL_RESPONSE, McpProcess, ToolServerClient};
use mcp_converse_agent::types::{ChatMessage, ContentBlock, MessageRole, ToolUse};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

const EMPTY_CATALOG_SERVER: &str = r#"
read line
echo '{"jsonrpc":"2.0","id":"req-1","result":{"protocolVersion":"2025-06-18"}}'
read line
read line
echo '{"jsonrpc":"2.0","id":"req-2","result":{"tools":[]}}'
while read line; do :; done
"#;

const SQLITE_LIKE_SERVER: &str = r#"
read line
echo '{"jsonrpc":"2.0","id":"req-1","result":{"protocolVersion":"2025-06-18","instructions":"Tables live in main."}}'
read line
read line
echo '{"jsonrpc":"2.0","id":"req-2","result":{"tools":[{"name":"list_tables","description":"List all tables","inputSchema":{"type":"object","properties":{}}},{"description":"nameless"}]}}'
read line
echo '{"jsonrpc":"2.0","id":"req-3","result":{"content":[{"type":"text","text":"users, orders"}],"isError":false}}'
while read line; do :; done
"#;

fn shell_server(name: &str, script: &str) -> ServerConfig {
    ServerConfig {
        name: name.into(),
        command: PathBuf::from("sh"),
        args: vec!["-c".into(), script.into()],
        env: HashMap::new(),
        workdir: None,
    }
}

struct ScriptedModel {
    replies: Mutex<VecDeque<ChatMessage>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    fn new(replies: Vec<ChatMessage>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ModelProvider for ScriptedModel {
    async fn converse(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        self.requests.lock().await.push(request);
        let message = self
            .replies
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| ModelError::invalid_response("scripted", "no reply left"))?;
        Ok(ModelResponse {
            message,
            stop_reason: None,
        })
    }
}

fn call(id: &str, name: &str) -> ChatMessage {
    ChatMessage::new(
        MessageRole::Assistant,
        vec![ContentBlock::ToolUse(ToolUse {
            tool_use_id: id.into(),
            name: name.into(),
            input: json!({}),
        })],
    )
}

#[tokio::test]
async fn empty_server_falls_back_to_help_tool() {
    let process = McpProcess::connect(shell_server("empty", EMPTY_CATALOG_SERVER))
        .await
        .expect("connect");
    let client: Arc<dyn ToolServerClient> = Arc::new(process.clone());

    let (mut session, report) = AgentSession::start(Arc::clone(&client))
        .await
        .expect("discovery");
    assert!(report.fallback_used);
    assert_eq!(session.registry().names(), vec![HELP_TOOL_NAME]);

    let model = ScriptedModel::new(vec![
        call("h1", HELP_TOOL_NAME),
        ChatMessage::text(MessageRole::Assistant, "Only the help tool is available."),
    ]);
    let agent = Agent::new(model, AgentOptions::default());

    let outcome = agent
        .respond_to(&mut session, "help")
        .await
        .expect("agent answers");

    assert_eq!(outcome.response, "Only the help tool is available.");
    assert_eq!(outcome.steps.len(), 1);
    assert!(outcome.steps[0].success);
    assert_eq!(outcome.steps[0].output, json!(HELP_TOOL_RESPONSE));

    let requests = agent.provider().requests.lock().await;
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].tools.len(), 1);
    assert_eq!(requests[0].tools[0].description, "Get help about available tools");
    assert_eq!(requests[0].messages[0].text_content(), "help");
    let results: Vec<_> = requests[1].messages[2].tool_results().cloned().collect();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].tool_use_id, "h1");
    assert!(!results[0].is_error());
    assert_eq!(results[0].content, json!("This is a help function"));

    process.shutdown().await;
}

#[tokio::test]
async fn remote_tool_is_called_through_the_server() {
    let process = McpProcess::connect(shell_server("sqlite", SQLITE_LIKE_SERVER))
        .await
        .expect("connect");
    let client: Arc<dyn ToolServerClient> = Arc::new(process.clone());

    let (mut session, report) = AgentSession::start(Arc::clone(&client))
        .await
        .expect("discovery");
    assert_eq!(report.registered, vec!["list_tables".to_string()]);
    assert_eq!(report.skipped.len(), 1);
    assert!(!report.fallback_used);
    assert_eq!(session.server_instructions(), Some("Tables live in main."));

    let model = ScriptedModel::new(vec![
        call("t1", "list_tables"),
        ChatMessage::text(MessageRole::Assistant, "There are two tables: users and orders."),
    ]);
    let agent = Agent::new(model, AgentOptions::default());

    let outcome = agent
        .respond_to(&mut session, "which tables exist?")
        .await
        .expect("agent answers");

    assert_eq!(outcome.response, "There are two tables: users and orders.");
    assert_eq!(outcome.steps[0].message.as_deref(), Some("users, orders"));

    let requests = agent.provider().requests.lock().await;
    let system = requests[0].system_prompt.as_deref().expect("system prompt");
    assert!(system.ends_with("Tables live in main."));
    let results: Vec<_> = requests[1].messages[2].tool_results().cloned().collect();
    assert_eq!(results[0].tool_use_id, "t1");
    assert_eq!(results[0].content, json!("users, orders"));

    process.shutdown().await;
}
