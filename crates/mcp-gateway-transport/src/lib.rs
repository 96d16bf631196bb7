//! Transport Driver (C1, §4.1): ship JSON-RPC frames bidirectionally over one
//! of {stdio, SSE, WebSocket} and signal liveness.
//!
//! All three variants implement the same [`Transport`] trait so the Request
//! Multiplexer (in `mcp-gateway-client`) never needs to know which wire
//! format it is speaking to.

pub mod core;
pub mod mock;
pub mod sse;
pub mod stdio;
pub mod websocket;

pub use core::{Transport, TransportError, TransportMessage, TransportResult};
pub use mock::MockTransport;
pub use sse::{SseConfig, SseTransport};
pub use stdio::{StdioConfig, StdioTransport};
pub use websocket::{WebSocketConfig, WebSocketTransport};
