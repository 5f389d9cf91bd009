use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use deepsearch_core::{catalog, compute_active_set, RuntimeConfig};
use deepsearch_mcp::{logging, settings};

#[derive(Parser, Debug)]
#[command(name = "deepsearch")]
#[command(about = "Web search and deep research tools (MCP stdio server)", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as an MCP stdio server (for Cursor / Claude Desktop / MCP clients).
    #[cfg(feature = "stdio")]
    McpStdio(ServeArgs),
    /// Print the capability catalog and which entries the given settings activate (json).
    Tools(ServeArgs),
    /// Print version info.
    Version(VersionCmd),
}

#[derive(clap::Args, Debug)]
struct ServeArgs {
    /// API key for the search service.
    #[arg(long, env = "DEEPSEARCH_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    /// Capabilities to enable, comma or space separated (default: web_search,get_code_context).
    #[arg(long, env = "DEEPSEARCH_TOOLS", value_delimiter = ',')]
    tools: Vec<String>,
    /// Log capability binding and request detail to stderr.
    #[arg(long, env = "DEEPSEARCH_DEBUG")]
    debug: bool,
    /// JSON config file (`apiKey`, `tools`, `debug`). Flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,
}

impl ServeArgs {
    fn resolve(self) -> Result<RuntimeConfig> {
        settings::load(
            self.config.as_deref(),
            settings::FlagValues {
                api_key: self.api_key,
                tools: self.tools,
                debug: self.debug,
            },
        )
    }
}

#[derive(clap::Args, Debug)]
struct VersionCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[cfg(feature = "stdio")]
async fn serve(cfg: RuntimeConfig) -> Result<()> {
    use deepsearch_remote::{http_client, ExaClient};
    use std::sync::Arc;

    let client = ExaClient::from_env(http_client()?, cfg.api_key.clone())?;
    if !client.has_api_key() {
        tracing::warn!("no API key configured; set --api-key or DEEPSEARCH_API_KEY");
    }
    deepsearch_mcp::server::serve_stdio(&cfg, Arc::new(client))
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))
}

fn tools_listing(cfg: &RuntimeConfig) -> serde_json::Value {
    let active = compute_active_set(cfg, catalog());
    let enabled = active.to_set();
    let tools: Vec<serde_json::Value> = catalog()
        .iter()
        .map(|d| {
            serde_json::json!({
                "id": d.id.as_str(),
                "name": d.display_name,
                "description": d.description,
                "default_enabled": d.default_enabled,
                "active": enabled.contains(&d.id),
            })
        })
        .collect();
    serde_json::json!({
        "schema_version": 1,
        "kind": "tools",
        "active": active.ids().iter().map(|id| id.as_str()).collect::<Vec<_>>(),
        "ignored": active.ignored(),
        "tools": tools,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        #[cfg(feature = "stdio")]
        Commands::McpStdio(args) => {
            let cfg = args.resolve()?;
            logging::init(cfg.debug);
            serve(cfg).await?;
        }
        Commands::Tools(args) => {
            let cfg = args.resolve()?;
            logging::init(cfg.debug);
            println!("{}", serde_json::to_string_pretty(&tools_listing(&cfg))?);
        }
        Commands::Version(args) => {
            let v = serde_json::json!({
                "schema_version": 1,
                "kind": "version",
                "name": "deepsearch",
                "version": env!("CARGO_PKG_VERSION"),
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => println!("deepsearch {}", env!("CARGO_PKG_VERSION")),
                _ => println!("{v}"),
            }
        }
    }
    Ok(())
}
