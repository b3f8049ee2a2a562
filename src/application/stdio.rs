use crate::agent::{Agent, AgentSession, AgentStep};
use crate::application::tooling::ToolServerClient;
use crate::model::ModelProvider;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info, warn};

pub const INTERACTIVE_PROMPT: &str = "Enter your prompt (or 'quit' to exit): ";
const QUIT_COMMANDS: [&str; 3] = ["quit", "exit", "q"];

#[derive(Debug, Error)]
pub enum StdioError {
    #[error("stdin/stdout I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize stdio response: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub fn is_quit_command(line: &str) -> bool {
    let trimmed = line.trim();
    QUIT_COMMANDS
        .iter()
        .any(|command| trimmed.eq_ignore_ascii_case(command))
}

/// Reads prompts line by line until a quit word, end of input, or Ctrl-C
/// while waiting. Ctrl-C during a pending prompt abandons only that prompt.
pub async fn run_interactive<P, R, W>(
    agent: &Agent<P>,
    session: &mut AgentSession,
    client: Arc<dyn ToolServerClient>,
    input: R,
    output: &mut W,
) -> Result<(), StdioError>
where
    P: ModelProvider,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    loop {
        output.write_all(INTERACTIVE_PROMPT.as_bytes()).await?;
        output.flush().await?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                output.write_all(b"\n").await?;
                info!("Interrupted while waiting for input");
                break;
            }
        };
        let Some(line) = line else {
            debug!("Input closed");
            break;
        };

        let prompt = line.trim();
        if prompt.is_empty() {
            continue;
        }
        if is_quit_command(prompt) {
            break;
        }

        refresh_if_changed(session, &client).await;

        let reply = tokio::select! {
            result = agent.respond_to(session, prompt) => match result {
                Ok(outcome) => format!("\n{}\n", outcome.response),
                Err(err) => {
                    error!(%err, "Prompt failed");
                    format!("\nError: {}\n", err.user_message())
                }
            },
            _ = tokio::signal::ctrl_c() => {
                warn!("Prompt cancelled by user");
                "\nRequest cancelled.\n".to_string()
            }
        };
        output.write_all(reply.as_bytes()).await?;
        output.flush().await?;
    }

    output.flush().await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct StdioChatRequest {
    prompt: String,
    #[serde(default)]
    reset_history: bool,
}

#[derive(Debug, Serialize)]
struct StdioChatResponse {
    session_id: Option<String>,
    content: Option<String>,
    error: Option<String>,
    tool_steps: Vec<AgentStep>,
}

impl StdioChatResponse {
    fn success(session_id: String, content: String, tool_steps: Vec<AgentStep>) -> Self {
        Self {
            session_id: Some(session_id),
            content: Some(content),
            error: None,
            tool_steps,
        }
    }

    fn error(session_id: Option<String>, message: impl Into<String>) -> Self {
        Self {
            session_id,
            content: None,
            error: Some(message.into()),
            tool_steps: Vec::new(),
        }
    }
}

/// Machine-facing variant: one JSON request per input line, one JSON
/// response per output line.
pub async fn run_json_lines<P, R, W>(
    agent: &Agent<P>,
    session: &mut AgentSession,
    client: Arc<dyn ToolServerClient>,
    input: R,
    output: &mut W,
) -> Result<(), StdioError>
where
    P: ModelProvider,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        debug!("Received STDIO line");

        let request = match serde_json::from_str::<StdioChatRequest>(&line) {
            Ok(request) => request,
            Err(err) => {
                error!(%err, "Failed to parse STDIO input line");
                let response = StdioChatResponse::error(
                    Some(session.id().to_string()),
                    format!("invalid request JSON: {err}"),
                );
                write_response(output, &response).await?;
                continue;
            }
        };

        if request.prompt.trim().is_empty() {
            let response =
                StdioChatResponse::error(Some(session.id().to_string()), "prompt cannot be empty");
            write_response(output, &response).await?;
            continue;
        }

        if request.reset_history {
            session.clear_history();
        }
        refresh_if_changed(session, &client).await;

        info!("Processing STDIO agent request");
        let response = match agent.respond_to(session, request.prompt.trim()).await {
            Ok(outcome) => {
                StdioChatResponse::success(outcome.session_id, outcome.response, outcome.steps)
            }
            Err(err) => {
                error!(%err, "Agent processing failed via STDIO");
                StdioChatResponse::error(Some(session.id().to_string()), err.user_message())
            }
        };
        write_response(output, &response).await?;
    }

    output.flush().await?;
    Ok(())
}

async fn refresh_if_changed(session: &mut AgentSession, client: &Arc<dyn ToolServerClient>) {
    if !client.take_catalog_changed() {
        return;
    }
    match session.refresh_tools(Arc::clone(client)).await {
        Ok(report) => info!(
            registered = report.registered.len(),
            fallback = report.fallback_used,
            "Tool catalogue refreshed"
        ),
        Err(err) => warn!(%err, "Keeping previous tools after failed refresh"),
    }
}

async fn write_response<W>(output: &mut W, response: &StdioChatResponse) -> Result<(), StdioError>
where
    W: AsyncWrite + Unpin,
{
    let mut payload = serde_json::to_vec(response)?;
    payload.push(b'\n');
    output.write_all(&payload).await?;
    output.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentOptions;
    use crate::application::tooling::{
        HELP_TOOL_NAME, RawToolCatalog, ToolInvokeError, ToolRegistry, help_tool,
    };
    use crate::model::{ModelError, ModelRequest, ModelResponse};
    use crate::types::{ChatMessage, MessageRole};
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Mutex;

    struct EchoProvider {
        seen: Mutex<Vec<ModelRequest>>,
    }

    #[async_trait]
    impl ModelProvider for EchoProvider {
        async fn converse(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
            let last = request
                .messages
                .last()
                .map(ChatMessage::text_content)
                .unwrap_or_default();
            self.seen.lock().await.push(request);
            if last == "fail" {
                return Err(ModelError::invalid_response("echo", "refused"));
            }
            Ok(ModelResponse {
                message: ChatMessage::text(MessageRole::Assistant, format!("echo: {last}")),
                stop_reason: None,
            })
        }
    }

    struct ChangingServer {
        changed: AtomicBool,
    }

    #[async_trait]
    impl ToolServerClient for ChangingServer {
        fn server_name(&self) -> &str {
            "stub"
        }

        async fn get_available_tools(&self) -> Result<RawToolCatalog, ToolInvokeError> {
            Ok(RawToolCatalog::from_json(json!({
                "tools": [{"name": "list_tables", "description": "List tables"}]
            })))
        }

        async fn call_tool(&self, _name: &str, _arguments: Value) -> Result<Value, ToolInvokeError> {
            Ok(json!({"content": []}))
        }

        fn take_catalog_changed(&self) -> bool {
            self.changed.swap(false, Ordering::SeqCst)
        }
    }

    fn fixture(changed: bool) -> (Agent<EchoProvider>, AgentSession, Arc<dyn ToolServerClient>) {
        let agent = Agent::new(
            EchoProvider {
                seen: Mutex::new(Vec::new()),
            },
            AgentOptions::default(),
        );
        let mut registry = ToolRegistry::new();
        registry.ensure_non_empty(help_tool);
        let client: Arc<dyn ToolServerClient> = Arc::new(ChangingServer {
            changed: AtomicBool::new(changed),
        });
        (agent, AgentSession::new(registry), client)
    }

    #[test]
    fn quit_words_are_case_insensitive() {
        for word in ["quit", "EXIT", " Q ", "Quit"] {
            assert!(is_quit_command(word), "{word}");
        }
        assert!(!is_quit_command("quitting"));
        assert!(!is_quit_command(""));
    }

    #[tokio::test]
    async fn interactive_loop_answers_until_quit() {
        let (agent, mut session, client) = fixture(false);
        let input: &[u8] = b"hello\n\nfail\nquit\nnever read\n";
        let mut output = Vec::new();

        run_interactive(&agent, &mut session, client, input, &mut output)
            .await
            .expect("loop finishes");

        let text = String::from_utf8(output).expect("utf8");
        assert!(text.starts_with(INTERACTIVE_PROMPT));
        assert!(text.contains("echo: hello"));
        assert!(text.contains("Error: "));
        assert!(!text.contains("never read"));
        assert_eq!(agent.provider().seen.lock().await.len(), 2);
        // the failed prompt was not committed
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn interactive_loop_stops_at_end_of_input() {
        let (agent, mut session, client) = fixture(false);
        let input: &[u8] = b"hello\n";
        let mut output = Vec::new();

        run_interactive(&agent, &mut session, client, input, &mut output)
            .await
            .expect("loop finishes");

        let text = String::from_utf8(output).expect("utf8");
        assert_eq!(text.matches(INTERACTIVE_PROMPT).count(), 2);
    }

    #[tokio::test]
    async fn json_lines_reply_per_request() {
        let (agent, mut session, client) = fixture(false);
        let input: &[u8] = b"{\"prompt\":\"hi\"}\nnot json\n{\"prompt\":\"  \"}\n";
        let mut output = Vec::new();

        run_json_lines(&agent, &mut session, client, input, &mut output)
            .await
            .expect("loop finishes");

        let responses: Vec<Value> = String::from_utf8(output)
            .expect("utf8")
            .lines()
            .map(|line| serde_json::from_str(line).expect("json line"))
            .collect();
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0]["content"], json!("echo: hi"));
        assert_eq!(responses[0]["session_id"], json!(session.id()));
        assert!(responses[1]["error"].is_string());
        assert_eq!(responses[2]["error"], json!("prompt cannot be empty"));
    }

    #[tokio::test]
    async fn catalogue_change_triggers_rediscovery_between_prompts() {
        let (agent, mut session, client) = fixture(true);
        assert_eq!(session.registry().names(), vec![HELP_TOOL_NAME]);
        let input: &[u8] = b"{\"prompt\":\"tables?\"}\n";
        let mut output = Vec::new();

        run_json_lines(&agent, &mut session, client, input, &mut output)
            .await
            .expect("loop finishes");

        assert_eq!(session.registry().names(), vec!["list_tables"]);
        let seen = agent.provider().seen.lock().await;
        assert_eq!(seen[0].tools[0].name, "list_tables");
    }
}
