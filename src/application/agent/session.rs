use crate::application::tooling::{
    DiscoveryError, DiscoveryReport, ToolRegistry, ToolServerClient, discover,
};
use crate::types::ChatMessage;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Everything one conversation with the tool server owns: the discovered
/// tools and the messages exchanged so far.
#[derive(Debug)]
pub struct AgentSession {
    id: String,
    started_at: DateTime<Utc>,
    registry: ToolRegistry,
    history: Vec<ChatMessage>,
    server_instructions: Option<String>,
}

impl AgentSession {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            registry,
            history: Vec::new(),
            server_instructions: None,
        }
    }

    /// Discovers the server's tools and opens a session around them.
    pub async fn start(
        client: Arc<dyn ToolServerClient>,
    ) -> Result<(Self, DiscoveryReport), DiscoveryError> {
        let mut registry = ToolRegistry::new();
        let report = discover(Arc::clone(&client), &mut registry).await?;
        let session = Self::new(registry).with_server_instructions(client.instructions().await);
        info!(
            session_id = session.id.as_str(),
            started_at = %session.started_at,
            tools = session.registry.len(),
            "Agent session started"
        );
        Ok((session, report))
    }

    pub fn with_server_instructions(mut self, instructions: Option<String>) -> Self {
        self.server_instructions = instructions.filter(|text| !text.trim().is_empty());
        self
    }

    /// Re-runs discovery into a fresh registry. The current tools stay in
    /// place if the catalogue cannot be fetched. Call only between prompts.
    pub async fn refresh_tools(
        &mut self,
        client: Arc<dyn ToolServerClient>,
    ) -> Result<DiscoveryReport, DiscoveryError> {
        let mut registry = ToolRegistry::new();
        let report = discover(client, &mut registry).await?;
        debug!(
            session_id = self.id.as_str(),
            before = self.registry.len(),
            after = registry.len(),
            "Replacing tool registry"
        );
        self.registry = registry;
        Ok(report)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn server_instructions(&self) -> Option<&str> {
        self.server_instructions.as_deref()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Replaces the history with the transcript of a finished prompt cycle.
    pub(super) fn commit(&mut self, transcript: Vec<ChatMessage>) {
        debug!(
            session_id = self.id.as_str(),
            previous = self.history.len(),
            total_messages = transcript.len(),
            "Committing conversation transcript"
        );
        self.history = transcript;
    }
}
