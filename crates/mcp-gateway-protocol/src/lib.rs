//! JSON-RPC 2.0 wire types and the MCP method surface the gateway speaks
//! (§6): `initialize`, `ping`, `tools/list`, `tools/call`, `resources/list`,
//! `resources/read`.

pub mod jsonrpc;
pub mod methods;
pub mod types;

pub use jsonrpc::{
    JsonRpcError, JsonRpcErrorCode, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, JsonRpcResponsePayload, JsonRpcVersion, ProtocolError,
};
pub use types::{InitializeResult, Resource, Tool};

/// The MCP protocol version string this gateway negotiates during
/// `initialize` (§4.3, §6). Pinned to a literal rather than derived, since a
/// client supporting multiple protocol revisions is out of scope here.
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
