//! The gateway's unified error taxonomy (§7).
//!
//! Every subsystem crate owns its own leaf error type (`TransportError`,
//! `PolicyDenial`, `ProtocolError`, ...) and converts into [`GatewayError`]
//! at its crate boundary via `From`. The Facade never surfaces a raw
//! subsystem error to callers — only a `GatewayError` with a stable `kind()`
//! and a human-readable message.

use thiserror::Error;

/// Result type alias used across the gateway's public APIs.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Why a policy decision denied a request. Shared by `mcp-gateway-policy`'s
/// `PolicyDenial` so `GatewayError::Forbidden` carries structured detail
/// instead of a free-form string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenialReason {
    /// `server.name` has no policy for the caller's tenant.
    UnknownServer,
    /// The server's `securityLevel` is `secret` and no `SecretAccessValidator`
    /// granted access (§9 open question 2 — resolved fail-closed).
    SecretTierDenied,
    /// The tool is present in `deniedTools`.
    ToolExplicitlyDenied,
    /// `allowedTools` is non-empty and the tool is not a member.
    ToolNotInAllowList,
    /// The rate limiter's sliding window is exhausted.
    RateLimited,
    /// The resource URI matched a pattern in `deniedResources`.
    ResourceExplicitlyDenied,
    /// `allowedResources` is non-empty (or unset — empty means deny-all, §4.5)
    /// and no pattern matched the URI.
    NoResourcePatternMatched,
    /// The policy's approval gate rejected the call.
    ApprovalDenied,
    /// The policy's approval gate did not respond within its configured timeout.
    ApprovalTimeout,
}

impl DenialReason {
    /// Stable, machine-readable reason string recorded on the audit entry.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownServer => "unknown_server",
            Self::SecretTierDenied => "secret_tier_denied",
            Self::ToolExplicitlyDenied => "tool_denied",
            Self::ToolNotInAllowList => "not in allow-list",
            Self::RateLimited => "rate_limited",
            Self::ResourceExplicitlyDenied => "resource_denied",
            Self::NoResourcePatternMatched => "no allow pattern matched",
            Self::ApprovalDenied => "approval_denied",
            Self::ApprovalTimeout => "approval_timeout",
        }
    }
}

/// The gateway's unified error type (§7).
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Policy denied the request.
    #[error("forbidden: {0:?}")]
    Forbidden(DenialReason),

    /// No live `Connection` exists for the requested (tenant, server).
    #[error("not connected to server {server:?}")]
    NotConnected { server: String },

    /// The capability cache has no tool by this name for this server/epoch.
    #[error("unknown tool {tool:?} on server {server:?}")]
    UnknownTool { server: String, tool: String },

    /// The capability cache has no resource by this URI for this server/epoch.
    #[error("unknown resource {uri:?} on server {server:?}")]
    UnknownResource { server: String, uri: String },

    /// The multiplexer's deadline elapsed before a response arrived.
    #[error("request timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// An I/O failure at the transport layer. Always transitions the owning
    /// `Connection` to `Degraded`.
    #[error("transport error: {0}")]
    TransportError(String),

    /// The MCP `initialize` exchange was rejected or timed out.
    #[error("handshake failed: {reason}")]
    HandshakeFailed { reason: String },

    /// A malformed JSON-RPC frame or unexpected shape. The connection that
    /// produced this is closed, not degraded-and-retried.
    #[error("protocol error: {0}")]
    ProtocolError(String),

    /// An unexpected invariant violation. Always audited at critical severity.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Stable `kind` string independent of the `Display` message, so log and
    /// audit consumers don't depend on message wording (§7.1).
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Forbidden(_) => "forbidden",
            Self::NotConnected { .. } => "not_connected",
            Self::UnknownTool { .. } => "unknown_tool",
            Self::UnknownResource { .. } => "unknown_resource",
            Self::Timeout { .. } => "timeout",
            Self::Cancelled => "cancelled",
            Self::TransportError(_) => "transport_error",
            Self::HandshakeFailed { .. } => "handshake_failed",
            Self::ProtocolError(_) => "protocol_error",
            Self::Internal(_) => "internal",
        }
    }

    /// The denial reason string recorded on the audit entry, if this error
    /// originated from a policy decision.
    #[must_use]
    pub fn denial_reason(&self) -> Option<&'static str> {
        match self {
            Self::Forbidden(reason) => Some(reason.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_stable_regardless_of_message() {
        let err = GatewayError::NotConnected {
            server: "srv1".into(),
        };
        assert_eq!(err.kind(), "not_connected");
    }

    #[test]
    fn forbidden_carries_denial_reason() {
        let err = GatewayError::Forbidden(DenialReason::RateLimited);
        assert_eq!(err.denial_reason(), Some("rate_limited"));
    }
}
