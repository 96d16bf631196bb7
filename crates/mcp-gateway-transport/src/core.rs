//! The `Transport` contract every variant implements (§4.1).

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// One raw inbound or outbound JSON-RPC line. Framing (newline-delimited for
/// stdio, SSE `data:` fields, WebSocket text frames) is stripped by the time
/// a `TransportMessage` reaches the caller.
#[derive(Debug, Clone)]
pub struct TransportMessage {
    pub raw: String,
}

impl TransportMessage {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }
}

/// Transport-level failures (§7 — always converted into
/// `GatewayError::TransportError` at the Facade boundary, and always
/// transitions the owning Connection to `Degraded`).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to open transport: {0}")]
    OpenFailed(String),

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("transport closed")]
    Closed,

    #[error("handshake timed out")]
    HandshakeTimeout,

    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Ship JSON-RPC frames bidirectionally and signal liveness (§4.1).
///
/// `recv()` hands out a single `mpsc::Receiver` once, at `open()` time — the
/// single-consumer contract the Request Multiplexer's reader task depends on.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Attempt the transport-specific handshake (spawn child; open HTTP
    /// event-stream; upgrade to WebSocket) and return the inbound frame
    /// stream. Called exactly once per transport instance.
    async fn open(&self) -> TransportResult<mpsc::Receiver<TransportResult<TransportMessage>>>;

    /// Write one JSON-RPC object. Implementors serialize writes internally
    /// (one writer per transport) so concurrent callers never interleave
    /// partial frames.
    async fn send(&self, frame: TransportMessage) -> TransportResult<()>;

    /// Idempotent; guaranteed to release OS resources (child process,
    /// sockets) even if called more than once or before `open()`.
    async fn close(&self);
}
