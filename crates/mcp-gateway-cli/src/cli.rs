//! CLI argument parsing (§2.1): a thin demo binary over the Client Facade.

use std::path::PathBuf;

use clap::Parser;

/// Command-line interface for exercising the MCP gateway's Client Facade
/// against a hand-authored tenant-policy file and server catalog.
#[derive(Parser, Debug)]
#[command(
    name = "mcp-gateway",
    version,
    about = "Demo CLI for the multi-tenant MCP gateway: connect, list tools/resources, call a tool"
)]
pub struct Cli {
    /// Tenant policy YAML file (§3: `SecurityPolicy` per server).
    #[arg(long)]
    pub policies: PathBuf,

    /// Server catalog YAML file (§6): already-concretized `ServerConfig`s.
    #[arg(long)]
    pub catalog: PathBuf,

    /// Optional `GatewayConfig` YAML override file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// If set, call this tool after connecting (format: `server/tool`).
    #[arg(long)]
    pub call_tool: Option<String>,

    /// JSON arguments for `--call-tool`.
    #[arg(long, default_value = "{}")]
    pub tool_args: String,

    /// Emit JSON instead of human-readable text.
    #[arg(long)]
    pub json: bool,
}
