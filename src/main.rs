use clap::{Parser, ValueEnum};
use mcp_converse_agent::agent::{Agent, AgentOptions, AgentSession};
use mcp_converse_agent::config::AppConfig;
use mcp_converse_agent::model::OllamaClient;
use mcp_converse_agent::stdio;
use mcp_converse_agent::tooling::{DiscoveryReport, McpProcess, ToolServerClient};
use serde_json::json;
use std::error::Error;
use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{BufReader, stdin, stdout};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(
    name = "mcp-converse",
    version,
    about = "Chat with an Ollama model that can call tools from an MCP server"
)]
struct Cli {
    /// Path to the TOML configuration (defaults to config/agent.toml).
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    ollama_url: Option<String>,
    /// Replaces the configured system prompt.
    #[arg(long)]
    system: Option<String>,
    #[arg(long, value_enum, default_value_t = RunMode::Interactive)]
    mode: RunMode,
    #[arg(long)]
    prompt_file: Option<PathBuf>,
    #[arg()]
    prompt: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RunMode {
    /// Read prompts from the terminal until a quit word.
    Interactive,
    /// Answer a single prompt and print the outcome as JSON.
    Once,
    /// One JSON request per stdin line, one JSON response per stdout line.
    Stdio,
    /// Print the discovery report and exit.
    Tools,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();
    debug!(?cli.mode, config = ?cli.config, "CLI arguments parsed");

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(model) = cli.model.clone() {
        config.model = model;
    }
    if let Some(url) = cli.ollama_url.clone() {
        config.ollama_url = url;
    }
    if let Some(system) = cli.system.clone().filter(|text| !text.trim().is_empty()) {
        config.system_prompt = system;
    }
    info!(model = %config.model, server = %config.server.name, "Configuration loaded");

    let provider = OllamaClient::with_timeout(
        config.ollama_url.clone(),
        Duration::from_secs(config.request_timeout_secs),
    )?;
    let agent = Agent::new(
        provider,
        AgentOptions {
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            retain_history: config.retain_history,
            max_tool_rounds: config.max_tool_rounds,
        },
    );

    let process = McpProcess::connect(config.server.clone())
        .await
        .map_err(|err| err.user_message())?;
    let result = run(&cli, &agent, process.clone()).await;
    process.shutdown().await;
    info!("Agent finished");
    result
}

async fn run(
    cli: &Cli,
    agent: &Agent<OllamaClient>,
    process: McpProcess,
) -> Result<(), Box<dyn Error>> {
    let client: Arc<dyn ToolServerClient> = Arc::new(process);
    let (mut session, report) = AgentSession::start(Arc::clone(&client))
        .await
        .map_err(|err| err.user_message())?;
    log_report(&report);

    match cli.mode {
        RunMode::Tools => {
            let output = json!({
                "report": report,
                "tools": session.registry().tool_specs(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        RunMode::Once => {
            let prompt = load_prompt(cli)?;
            let outcome = agent
                .respond_to(&mut session, &prompt)
                .await
                .map_err(|err| err.user_message())?;
            let output = json!({
                "session_id": outcome.session_id,
                "content": outcome.response,
                "tool_steps": outcome.steps,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        RunMode::Stdio => {
            info!("Entering STDIO mode; awaiting JSON line input");
            let mut output = stdout();
            stdio::run_json_lines(
                agent,
                &mut session,
                client,
                BufReader::new(stdin()),
                &mut output,
            )
            .await?;
        }
        RunMode::Interactive => {
            let mut output = stdout();
            stdio::run_interactive(
                agent,
                &mut session,
                client,
                BufReader::new(stdin()),
                &mut output,
            )
            .await?;
        }
    }
    Ok(())
}

fn log_report(report: &DiscoveryReport) {
    info!(
        server = %report.server,
        found = report.found,
        registered = report.registered.len(),
        fallback = report.fallback_used,
        "Tool discovery complete"
    );
    for warning in &report.warnings {
        warn!(server = %report.server, "{warning}");
    }
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .with_target(false)
            .with_level(true)
            .init();
    });
}

fn load_prompt(cli: &Cli) -> Result<String, Box<dyn Error>> {
    if let Some(path) = &cli.prompt_file {
        info!(path = %path.display(), "Loading prompt from file");
        let content = fs::read_to_string(path)?;
        return Ok(normalize_prompt(content));
    }

    if !cli.prompt.is_empty() {
        info!("Using prompt provided through CLI arguments");
        return Ok(normalize_prompt(cli.prompt.join(" ")));
    }

    if !io::stdin().is_terminal() {
        info!("Reading prompt from standard input");
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        return Ok(normalize_prompt(buffer));
    }

    warn!("Prompt not provided via arguments, file, or stdin");
    Err("prompt required via arguments, file, or stdin".into())
}

fn normalize_prompt(prompt: String) -> String {
    prompt.trim().to_string()
}
