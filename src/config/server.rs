use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

pub const DEFAULT_SERVER_NAME: &str = "sqlite";
pub const DEFAULT_SERVER_COMMAND: &str = "uvx";
pub const DEFAULT_SERVER_ARGS: [&str; 3] = ["mcp-server-sqlite", "--db-path", "~/test.db"];

/// How to launch the MCP tool server the agent talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub name: String,
    pub command: PathBuf,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub workdir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig::from(RawServer {
            name: DEFAULT_SERVER_NAME.to_string(),
            command: DEFAULT_SERVER_COMMAND.to_string(),
            args: DEFAULT_SERVER_ARGS.iter().map(|arg| arg.to_string()).collect(),
            env: HashMap::new(),
            workdir: None,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawServer {
    #[serde(default = "default_server_name")]
    name: String,
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: HashMap<String, String>,
    workdir: Option<String>,
}

fn default_server_name() -> String {
    DEFAULT_SERVER_NAME.to_string()
}

impl From<RawServer> for ServerConfig {
    fn from(raw: RawServer) -> Self {
        let expand = |s: &str| -> String {
            shellexpand::full(s)
                .map(|cow| cow.into_owned())
                .unwrap_or_else(|_| s.to_string())
        };

        Self {
            name: raw.name,
            command: PathBuf::from(expand(&raw.command)),
            args: raw.args.iter().map(|arg| expand(arg)).collect(),
            env: raw.env,
            workdir: raw.workdir.map(|dir| PathBuf::from(expand(&dir))),
        }
    }
}
