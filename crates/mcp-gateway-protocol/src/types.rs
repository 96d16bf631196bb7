//! MCP result-shape types: `Tool`, `Resource`, and the `initialize` handshake
//! payload (§3, §6). These are raw wire shapes with no epoch tagging — the
//! Capability Cache in `mcp-gateway-client` is what attaches a connection
//! epoch to a snapshot of these.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named server-side operation advertised by `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tool {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// A URI-addressable server-side datum advertised by `resources/list`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Resource {
    pub uri: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "mimeType", default)]
    pub mime_type: Option<String>,
}

/// Client identity sent in the `initialize` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

/// Server identity and capability advertisement returned by `initialize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

/// The full result of a successful `initialize` handshake (§4.3 step 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    pub server_info: ServerInfo,
    #[serde(default)]
    pub capabilities: Value,
}
