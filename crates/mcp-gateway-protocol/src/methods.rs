//! MCP method name constants (§6). Kept as `&str` constants rather than an
//! enum because the wire format is a plain string and these names are passed
//! straight into `JsonRpcRequest::new`.

pub const INITIALIZE: &str = "initialize";
pub const PING: &str = "ping";
pub const TOOLS_LIST: &str = "tools/list";
pub const TOOLS_CALL: &str = "tools/call";
pub const RESOURCES_LIST: &str = "resources/list";
pub const RESOURCES_READ: &str = "resources/read";
