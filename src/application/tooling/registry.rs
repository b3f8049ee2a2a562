use super::error::ToolInvokeError;
use super::interface::ToolServerClient;
use crate::domain::schema::{NormalizedSchema, ToolInputSchema, ToolSpec};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

pub const HELP_TOOL_NAME: &str = "help";
pub const HELP_TOOL_DESCRIPTION: &str = "Get help about available tools";
pub const HELP_TOOL_RESPONSE: &str = "This is a help function";
pub const MISSING_DESCRIPTION: &str = "Tool description not available";

/// Anything the agent can execute on the model's behalf.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn invoke(&self, arguments: Value) -> Result<Value, ToolInvokeError>;
}

/// A local tool that always answers with the same value.
pub struct StaticTool {
    response: Value,
}

impl StaticTool {
    pub fn new(response: impl Into<Value>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

#[async_trait]
impl ToolHandler for StaticTool {
    async fn invoke(&self, _arguments: Value) -> Result<Value, ToolInvokeError> {
        Ok(self.response.clone())
    }
}

/// A tool executed by the MCP server under its advertised name.
pub struct RemoteTool {
    name: String,
    client: Arc<dyn ToolServerClient>,
}

impl RemoteTool {
    pub fn new(name: impl Into<String>, client: Arc<dyn ToolServerClient>) -> Self {
        Self {
            name: name.into(),
            client,
        }
    }
}

#[async_trait]
impl ToolHandler for RemoteTool {
    async fn invoke(&self, arguments: Value) -> Result<Value, ToolInvokeError> {
        self.client.call_tool(&self.name, arguments).await
    }
}

#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: ToolInputSchema,
    pub handler: Arc<dyn ToolHandler>,
}

impl ToolDescriptor {
    pub fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
        }
    }
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .finish_non_exhaustive()
    }
}

/// The fallback registered when the tool server offers nothing.
pub fn help_tool() -> ToolDescriptor {
    ToolDescriptor {
        name: HELP_TOOL_NAME.to_string(),
        description: HELP_TOOL_DESCRIPTION.to_string(),
        input_schema: ToolInputSchema::from(NormalizedSchema::empty()),
        handler: Arc::new(StaticTool::new(HELP_TOOL_RESPONSE)),
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tool name must not be empty")]
    EmptyName,
}

/// Tools available to the model, keyed by name and listed in the order they
/// were first registered.
#[derive(Debug, Default, Clone)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool. Re-registering a name replaces the earlier entry in
    /// place.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: Arc<dyn ToolHandler>,
        description: impl Into<String>,
        input_schema: ToolInputSchema,
    ) -> Result<(), RegistryError> {
        self.insert(ToolDescriptor {
            name: name.into(),
            description: description.into(),
            input_schema,
            handler,
        })
    }

    pub fn insert(&mut self, descriptor: ToolDescriptor) -> Result<(), RegistryError> {
        if descriptor.name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }

        match self.index.get(&descriptor.name) {
            Some(&slot) => {
                debug!(tool = %descriptor.name, "Replacing previously registered tool");
                self.tools[slot] = descriptor;
            }
            None => {
                self.index.insert(descriptor.name.clone(), self.tools.len());
                self.tools.push(descriptor);
            }
        }
        Ok(())
    }

    pub fn list(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn lookup(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|&slot| &self.tools[slot])
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|tool| tool.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Installs the descriptor built by `fallback` when nothing is
    /// registered. Returns whether it did.
    pub fn ensure_non_empty<F>(&mut self, fallback: F) -> bool
    where
        F: FnOnce() -> ToolDescriptor,
    {
        if !self.is_empty() {
            return false;
        }
        let descriptor = fallback();
        debug!(tool = %descriptor.name, "Registering fallback tool");
        self.insert(descriptor).is_ok()
    }

    /// The catalog in the shape the model API expects.
    pub fn tool_specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(ToolDescriptor::spec).collect()
    }
}
