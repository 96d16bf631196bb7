//! Request Multiplexer (C2), Capability Cache (C4), Connection Supervisor
//! (C3), and Client Facade (C9): everything an embedding process needs to
//! speak to a fleet of MCP servers through one policy-enforced, audited
//! surface (§4.2–§4.4, §4.9).

pub mod capability;
pub mod connection;
pub mod facade;
pub mod handle;
pub mod multiplexer;
pub mod supervisor;

pub use capability::{CapabilityCache, CapabilitySnapshot};
pub use connection::{Connection, ConnectionRuntime};
pub use facade::{GatewayClient, ServerStatus};
pub use handle::{ResourceHandle, ToolHandle};
pub use multiplexer::{CallError, RequestMultiplexer};
pub use supervisor::{ConnectionSupervisor, SupervisorParams};
