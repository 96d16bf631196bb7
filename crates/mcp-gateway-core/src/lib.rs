//! Shared ids, configuration, and error taxonomy for the MCP gateway.
//!
//! This crate has no async runtime dependency and no I/O of its own; it is the
//! foundation layer every other `mcp-gateway-*` crate builds on.

pub mod catalog;
pub mod config;
pub mod error;
pub mod ids;
pub mod model;

pub use catalog::ServerCatalog;
pub use config::GatewayConfig;
pub use error::{DenialReason, GatewayError, GatewayResult};
pub use ids::{ConnectionEpoch, EpochCounter, RequestId, TenantId};
pub use model::{ConnectionState, ServerConfig, TransportKind};
