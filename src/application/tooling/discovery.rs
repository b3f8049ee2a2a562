//! Turns a tool server's catalogue into registry entries.
//!
//! Discovery only fails when the catalogue itself cannot be fetched. Odd
//! catalogue shapes, nameless entries and entries that fail to register are
//! recorded in the [`DiscoveryReport`] and skipped, and the registry always
//! ends up with at least the fallback `help` tool.

use super::error::ToolInvokeError;
use super::interface::{RawToolCatalog, ToolServerClient};
use super::registry::{
    MISSING_DESCRIPTION, RegistryError, RemoteTool, ToolRegistry, help_tool,
};
use crate::domain::schema::{ToolInputSchema, normalize};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to fetch tool catalogue from '{server}': {source}")]
    Catalog {
        server: String,
        #[source]
        source: ToolInvokeError,
    },
}

impl DiscoveryError {
    pub fn user_message(&self) -> String {
        match self {
            DiscoveryError::Catalog { source, .. } => source.user_message(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedTool {
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolFailure {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryReport {
    pub server: String,
    pub found: usize,
    pub registered: Vec<String>,
    pub skipped: Vec<SkippedTool>,
    pub failures: Vec<ToolFailure>,
    pub warnings: Vec<String>,
    pub fallback_used: bool,
    pub discovered_at: DateTime<Utc>,
}

impl DiscoveryReport {
    fn new(server: &str) -> Self {
        Self {
            server: server.to_string(),
            found: 0,
            registered: Vec::new(),
            skipped: Vec::new(),
            failures: Vec::new(),
            warnings: Vec::new(),
            fallback_used: false,
            discovered_at: Utc::now(),
        }
    }
}

#[derive(Debug, Error)]
enum EntryError {
    #[error("tool name must be a string, found {0}")]
    NameNotText(Value),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

enum EntryOutcome {
    Registered(String),
    Skipped(&'static str),
}

type ExtractionStrategy = fn(&RawToolCatalog) -> Option<Vec<Value>>;

/// Tried in order; the first strategy that recognises the payload wins.
const EXTRACTION_STRATEGIES: [ExtractionStrategy; 2] = [tools_from_listing, tools_from_key];

fn tools_from_listing(catalog: &RawToolCatalog) -> Option<Vec<Value>> {
    match catalog {
        RawToolCatalog::Listing(listing) => Some(listing.tools.clone()),
        RawToolCatalog::Json(_) => None,
    }
}

fn tools_from_key(catalog: &RawToolCatalog) -> Option<Vec<Value>> {
    match catalog {
        RawToolCatalog::Json(value) => match value.get("tools") {
            Some(Value::Array(tools)) => Some(tools.clone()),
            Some(Value::Null) => Some(Vec::new()),
            _ => None,
        },
        RawToolCatalog::Listing(_) => None,
    }
}

/// Pulls the tool entries out of a catalogue, or `None` if its shape is not
/// recognised.
pub fn extract_tools(catalog: &RawToolCatalog) -> Option<Vec<Value>> {
    EXTRACTION_STRATEGIES
        .iter()
        .find_map(|strategy| strategy(catalog))
}

pub async fn discover(
    client: Arc<dyn ToolServerClient>,
    registry: &mut ToolRegistry,
) -> Result<DiscoveryReport, DiscoveryError> {
    let server = client.server_name().to_string();
    let mut report = DiscoveryReport::new(&server);

    let catalog = client
        .get_available_tools()
        .await
        .map_err(|source| DiscoveryError::Catalog {
            server: server.clone(),
            source,
        })?;
    debug!(server = %server, ?catalog, "Received tool catalogue");

    let entries = match extract_tools(&catalog) {
        Some(entries) => entries,
        None => {
            let warning = format!("unexpected tool catalogue format: {}", describe(&catalog));
            warn!(server = %server, "{warning}");
            report.warnings.push(warning);
            Vec::new()
        }
    };
    report.found = entries.len();

    if entries.is_empty() {
        warn!(server = %server, "No tools found in catalogue");
        report.fallback_used = registry.ensure_non_empty(help_tool);
        if report.fallback_used {
            info!("Registered default help tool");
        }
        return Ok(report);
    }

    for (index, entry) in entries.iter().enumerate() {
        match register_entry(&client, registry, entry) {
            Ok(EntryOutcome::Registered(name)) if report.registered.contains(&name) => {
                let warning =
                    format!("tool '{name}' listed more than once; entry {index} replaces it");
                warn!(server = %server, "{warning}");
                report.warnings.push(warning);
            }
            Ok(EntryOutcome::Registered(name)) => report.registered.push(name),
            Ok(EntryOutcome::Skipped(reason)) => {
                warn!(server = %server, index, entry = %entry, "Skipping tool: {reason}");
                report.skipped.push(SkippedTool {
                    index,
                    reason: reason.to_string(),
                });
            }
            Err(err) => {
                warn!(server = %server, index, %err, "Error registering tool");
                report.failures.push(ToolFailure {
                    index,
                    name: entry.get("name").and_then(Value::as_str).map(str::to_string),
                    reason: err.to_string(),
                });
            }
        }
    }

    if registry.ensure_non_empty(help_tool) {
        let warning = "no catalogue entry could be registered; using the help tool".to_string();
        warn!(server = %server, "{warning}");
        report.warnings.push(warning);
        report.fallback_used = true;
    }

    info!(
        server = %server,
        found = report.found,
        registered = report.registered.len(),
        skipped = report.skipped.len(),
        failed = report.failures.len(),
        "Tool discovery finished"
    );
    Ok(report)
}

fn register_entry(
    client: &Arc<dyn ToolServerClient>,
    registry: &mut ToolRegistry,
    entry: &Value,
) -> Result<EntryOutcome, EntryError> {
    let name = match entry.get("name") {
        None | Some(Value::Null) => return Ok(EntryOutcome::Skipped("tool has no name")),
        Some(Value::String(name)) => name.clone(),
        Some(other) => return Err(EntryError::NameNotText(other.clone())),
    };
    let description = entry
        .get("description")
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
        .unwrap_or(MISSING_DESCRIPTION);
    let schema = normalize(entry.get("inputSchema"));
    debug!(tool = %name, ?schema, "Normalized tool input schema");

    registry.register(
        name.clone(),
        Arc::new(RemoteTool::new(name.clone(), Arc::clone(client))),
        description,
        ToolInputSchema::from(schema),
    )?;
    info!(tool = %name, "Registered tool");
    Ok(EntryOutcome::Registered(name))
}

fn describe(catalog: &RawToolCatalog) -> String {
    match catalog {
        RawToolCatalog::Listing(_) => "tool listing".to_string(),
        RawToolCatalog::Json(value) => match value {
            Value::Null => "null".to_string(),
            Value::Bool(_) => "boolean".to_string(),
            Value::Number(n) => format!("number {n}"),
            Value::String(_) => "string".to_string(),
            Value::Array(_) => "array".to_string(),
            Value::Object(map) => format!(
                "object with keys [{}]",
                map.keys().cloned().collect::<Vec<_>>().join(", ")
            ),
        },
    }
}
