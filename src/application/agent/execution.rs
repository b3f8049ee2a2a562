use super::models::AgentStep;
use crate::application::tooling::ToolRegistry;
use crate::types::{ToolResult, ToolUse};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Runs one tool-use request against the registry. Every outcome, including
/// unknown tools and failing handlers, becomes a tool result for the model.
pub(super) async fn execute_tool(
    registry: &ToolRegistry,
    request: ToolUse,
) -> (ToolResult, AgentStep) {
    let ToolUse {
        tool_use_id,
        name,
        input,
    } = request;

    let Some(tool) = registry.lookup(&name) else {
        warn!(requested_tool = %name, "Unknown tool requested by model");
        let message = format!("Tool '{name}' is not available");
        let step = AgentStep {
            tool: name,
            tool_use_id: tool_use_id.clone(),
            input,
            success: false,
            output: Value::Null,
            message: Some(message.clone()),
        };
        return (ToolResult::error(tool_use_id, message), step);
    };

    let arguments = match input.clone() {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };

    debug!(tool = %name, tool_use_id = %tool_use_id, "Dispatching tool");
    match tool.handler.invoke(arguments).await {
        Ok(output) => {
            let is_error = output
                .get("isError")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let message = extract_tool_message(&output);
            let content = match &message {
                Some(text) if output.get("content").is_some() => Value::String(text.clone()),
                _ => output.clone(),
            };
            info!(tool = %name, success = !is_error, "Tool executed");
            let result = if is_error {
                ToolResult::error(tool_use_id.clone(), content_as_text(&content))
            } else {
                ToolResult::success(tool_use_id.clone(), content)
            };
            let step = AgentStep {
                tool: name,
                tool_use_id,
                input,
                success: !is_error,
                output,
                message,
            };
            (result, step)
        }
        Err(err) => {
            warn!(tool = %name, %err, "Tool execution failed");
            let message = format!("Error executing tool '{name}': {err}");
            let step = AgentStep {
                tool: name,
                tool_use_id: tool_use_id.clone(),
                input,
                success: false,
                output: Value::Null,
                message: Some(message.clone()),
            };
            (ToolResult::error(tool_use_id, message), step)
        }
    }
}

fn content_as_text(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Joins the text blocks of an MCP `tools/call` result, falling back to a
/// structured error message.
fn extract_tool_message(result: &Value) -> Option<String> {
    if let Some(blocks) = result.get("content").and_then(Value::as_array) {
        let texts: Vec<&str> = blocks
            .iter()
            .filter(|block| {
                block
                    .get("type")
                    .and_then(Value::as_str)
                    .is_some_and(|kind| kind.eq_ignore_ascii_case("text"))
            })
            .filter_map(|block| block.get("text").and_then(Value::as_str))
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .collect();
        if !texts.is_empty() {
            return Some(texts.join("\n"));
        }
    }

    result
        .get("structuredContent")
        .and_then(|structured| structured.get("error"))
        .and_then(|error| error.get("message"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .map(str::to_string)
}
