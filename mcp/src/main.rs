use std::sync::Arc;

use clap::Parser;
use serde_json::{Map, Value, json};
use slide_core::config::{
    ConfigError, DEFAULT_BASE_URL, SERVER_NAME, SERVER_VERSION, parse_disabled_tools,
    parse_env_flag,
};
use slide_core::{ServerConfig, ToolsMode};
use slide_mcp_runtime::McpServer;
use slide_mcp_runtime::stdio::{TransportError, serve_stdio};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str =
    "slide_mcp_server=info,slide_mcp_runtime=info,slide_mcp_http=info,tower_http=info";
const PRESENTATION_ENV: &str = "SLIDE_ENABLE_PRESENTATION";
const REPORTS_ENV: &str = "SLIDE_ENABLE_REPORTS";

#[derive(Parser, Debug)]
#[command(
    name = "slide-mcp-server",
    about = "Slide backup MCP server over stdio or HTTP",
    disable_version_flag = true
)]
struct Cli {
    /// Slide API key
    #[arg(long, env = "SLIDE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Slide API base URL
    #[arg(long, env = "SLIDE_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Tools mode: reporting, restores, full-safe or full
    #[arg(long = "tools", env = "SLIDE_TOOLS", default_value = "full-safe")]
    tools: String,

    /// Comma-separated tool names to disable
    #[arg(long, env = "SLIDE_DISABLED_TOOLS", default_value = "")]
    disabled_tools: String,

    /// Enable the presentation tool (also SLIDE_ENABLE_PRESENTATION=true|1)
    #[arg(long)]
    enable_presentation: bool,

    /// Enable the reports tool (also SLIDE_ENABLE_REPORTS=true|1)
    #[arg(long)]
    enable_reports: bool,

    /// Print version and exit
    #[arg(long)]
    version: bool,

    /// Exit after answering the first request
    #[arg(long)]
    exit_after_first: bool,

    /// Run one tool call and print the JSON-RPC response
    #[arg(long)]
    tool: Option<String>,

    /// JSON arguments for --tool
    #[arg(long, default_value = "{}")]
    args: String,

    /// Serve HTTP+SSE on 0.0.0.0:<port> instead of stdio
    #[arg(long, env = "SLIDE_HTTP_PORT")]
    http_port: Option<u16>,
}

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("HTTP transport failed: {0}")]
    Http(#[from] std::io::Error),
}

/// Builds the frozen config. Flags win over the environment gates read through `env`.
fn build_config<F>(cli: &Cli, env: F) -> Result<ServerConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mode: ToolsMode = cli.tools.parse()?;
    let config = ServerConfig::new(cli.api_key.clone().unwrap_or_default(), cli.base_url.clone())?
        .with_tools_mode(mode)
        .with_disabled_tools(parse_disabled_tools(&cli.disabled_tools))
        .with_presentation(
            cli.enable_presentation || parse_env_flag(env(PRESENTATION_ENV).as_deref()),
        )
        .with_reports(cli.enable_reports || parse_env_flag(env(REPORTS_ENV).as_deref()));
    Ok(config)
}

fn tool_call_request(tool: &str, raw_args: &str) -> Result<Value, ConfigError> {
    let arguments: Map<String, Value> = serde_json::from_str(raw_args)
        .map_err(|e| ConfigError::InvalidToolArgs(e.to_string()))?;
    Ok(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "tools/call",
        "params": {
            "name": tool,
            "arguments": arguments
        }
    }))
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let config = Arc::new(build_config(&cli, |key| std::env::var(key).ok())?);
    tracing::info!(
        event = "server_starting",
        version = SERVER_VERSION,
        tools_mode = %config.tools_mode,
        disabled_tools = ?config.disabled_tools,
        presentation = config.enable_presentation,
        reports = config.enable_reports
    );
    let server = McpServer::new(config);

    if let Some(tool) = cli.tool.as_deref() {
        let request = tool_call_request(tool, &cli.args)?;
        let response = server
            .handle_single_message(request)
            .await
            .unwrap_or(Value::Null);
        println!("{}", slide_mcp_runtime::util::to_pretty_json(&response));
        return Ok(());
    }

    match cli.http_port {
        Some(port) => slide_mcp_http::serve(server, port).await?,
        None => serve_stdio(&server, cli.exit_after_first).await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    if cli.version {
        println!("{SERVER_NAME} version {SERVER_VERSION}");
        return;
    }

    init_tracing();
    let code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(event = "server_failed", error = %e);
            eprintln!("Error: {e}");
            1
        }
    };
    std::process::exit(code);
}
