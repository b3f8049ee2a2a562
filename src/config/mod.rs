mod server;

pub use server::ServerConfig;

use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_MODEL: &str = "llama3.1";
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
pub const DEFAULT_CONFIG_PATH: &str = "config/agent.toml";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant that can use tools to help you answer \
questions and perform tasks.";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub model: String,
    pub ollama_url: String,
    pub system_prompt: String,
    pub retain_history: bool,
    pub max_tool_rounds: Option<usize>,
    pub request_timeout_secs: u64,
    pub server: ServerConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config from {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config from {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    model: Option<String>,
    ollama_url: Option<String>,
    system_prompt: Option<String>,
    retain_history: Option<bool>,
    max_tool_rounds: Option<usize>,
    request_timeout_secs: Option<u64>,
    server: Option<server::RawServer>,
}

impl AppConfig {
    /// Loads the given file, or `config/agent.toml` when no path is given.
    /// A missing default file yields [`AppConfig::default`].
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return read_config(path);
        }
        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        match read_config(default_path) {
            Ok(config) => Ok(config),
            Err(ConfigError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                info!("Configuration file not found; using defaults");
                Ok(Self::default())
            }
            Err(other) => Err(other),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            retain_history: true,
            max_tool_rounds: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            server: ServerConfig::default(),
        }
    }
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    debug!(path = %path.display(), "Reading agent configuration file");
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_config(content: &str) -> Result<AppConfig, toml::de::Error> {
    let parsed: RawConfig = toml::from_str(content)?;
    let defaults = AppConfig::default();
    Ok(AppConfig {
        model: parsed.model.unwrap_or(defaults.model),
        ollama_url: parsed.ollama_url.unwrap_or(defaults.ollama_url),
        system_prompt: parsed
            .system_prompt
            .filter(|prompt| !prompt.trim().is_empty())
            .unwrap_or(defaults.system_prompt),
        retain_history: parsed.retain_history.unwrap_or(defaults.retain_history),
        max_tool_rounds: parsed.max_tool_rounds.or(defaults.max_tool_rounds),
        request_timeout_secs: parsed
            .request_timeout_secs
            .unwrap_or(defaults.request_timeout_secs),
        server: parsed
            .server
            .map(ServerConfig::from)
            .unwrap_or(defaults.server),
    })
}
