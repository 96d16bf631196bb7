//! Thin demo binary (§2.1): loads a tenant-policy file and a server catalog,
//! connects every server in the catalog, lists tools/resources, optionally
//! calls one tool, then disconnects — exercising the Client Facade (§4.9)
//! end to end the way the teacher's `demo/` binary exercises a server.

mod cli;
mod tenant_file;

use std::fs;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use mcp_gateway_client::GatewayClient;
use mcp_gateway_core::{GatewayConfig, ServerCatalog};
use mcp_gateway_policy::{AlwaysDenySecretValidator, AutoGrantResolver};

use cli::Cli;
use tenant_file::TenantPolicyFile;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = GatewayConfig::load(cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("loading gateway config: {e}"))?;

    let tenant_yaml = fs::read_to_string(&cli.policies)
        .with_context(|| format!("reading tenant policy file {:?}", cli.policies))?;
    let tenant_file: TenantPolicyFile =
        serde_yaml::from_str(&tenant_yaml).context("parsing tenant policy file")?;

    let catalog_yaml = fs::read_to_string(&cli.catalog)
        .with_context(|| format!("reading server catalog {:?}", cli.catalog))?;
    let catalog: ServerCatalog = serde_yaml::from_str(&catalog_yaml).context("parsing server catalog")?;

    // Demo-explicit choices, never implicit defaults (§9 redesign guidance):
    // grant every approval immediately, deny every secret-tier access.
    let client = GatewayClient::new(
        config,
        Box::new(AutoGrantResolver),
        Box::new(AlwaysDenySecretValidator),
    );

    let tenant_id = tenant_file.tenant_id.clone();
    client.add_tenant(tenant_id.clone());
    for policy in tenant_file.policies {
        client
            .set_policy(policy)
            .map_err(|e| anyhow::anyhow!("invalid policy: {e}"))?;
    }

    for server_config in &catalog.servers {
        info!(server = %server_config.name, "connecting");
        client
            .connect_server(&tenant_id, server_config.clone(), None)
            .await
            .map_err(|e| anyhow::anyhow!("connecting to {:?}: {e}", server_config.name))?;
    }

    let tools = client
        .list_tools(&tenant_id, None)
        .map_err(|e| anyhow::anyhow!("listing tools: {e}"))?;
    let resources = client
        .list_resources(&tenant_id, None)
        .map_err(|e| anyhow::anyhow!("listing resources: {e}"))?;

    if cli.json {
        let summary = serde_json::json!({
            "tools": tools.iter().map(|t| serde_json::json!({"server": t.server, "name": t.name()})).collect::<Vec<_>>(),
            "resources": resources.iter().map(|r| serde_json::json!({"server": r.server, "uri": r.uri()})).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Connected to {} server(s).", catalog.servers.len());
        println!("Tools:");
        for tool in &tools {
            println!("  {}/{}", tool.server, tool.name());
        }
        println!("Resources:");
        for resource in &resources {
            println!("  {}/{}", resource.server, resource.uri());
        }
    }

    if let Some(spec) = &cli.call_tool {
        let Some((server, tool_name)) = spec.split_once('/') else {
            bail!("--call-tool expects `server/tool`, got {spec:?}");
        };
        let handle = tools
            .iter()
            .find(|t| t.server == server && t.name() == tool_name)
            .with_context(|| format!("no such tool {spec:?} on any connected server"))?;
        let args: serde_json::Value =
            serde_json::from_str(&cli.tool_args).context("parsing --tool-args as JSON")?;
        let cancel = CancellationToken::new();
        let result = client
            .call_tool(&tenant_id, handle, args, None, &cancel)
            .await
            .map_err(|e| anyhow::anyhow!("calling {spec:?}: {e}"))?;
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    for server_config in &catalog.servers {
        let _ = client
            .disconnect_server(&tenant_id, &server_config.name, None)
            .await;
    }

    Ok(())
}
