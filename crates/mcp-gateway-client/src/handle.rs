//! Epoch-tagged tool/resource handles.
//!
//! §4.9's facade table takes plain tool/resource identifiers, but scenario 6
//! in §8 requires that a tool reference obtained before a reconnect is
//! rejected afterward rather than silently dispatched against a dead
//! connection. `listTools`/`listResources` mint handles carrying the epoch
//! the Capability Cache snapshot was taken under; `callTool`/`readResource`
//! check the handle's epoch against the Connection's current epoch before
//! any network activity, so a stale handle never produces a frame on the
//! wire.

use mcp_gateway_core::ConnectionEpoch;
use mcp_gateway_protocol::{Resource, Tool};

/// A `Tool` as returned to a caller, carrying the epoch it was listed under.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolHandle {
    pub server: String,
    pub tool: Tool,
    pub epoch: ConnectionEpoch,
}

impl ToolHandle {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.tool.name
    }
}

/// A `Resource` as returned to a caller, carrying the epoch it was listed
/// under.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceHandle {
    pub server: String,
    pub resource: Resource,
    pub epoch: ConnectionEpoch,
}

impl ResourceHandle {
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.resource.uri
    }
}
