//! Shared data-model entities used by more than one subsystem crate (§3).
//!
//! `ServerConfig` is needed by both `mcp-gateway-transport` (to open a
//! connection) and `mcp-gateway-client` (to key the connection table), so it
//! lives here rather than in either.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ids::TenantId;

/// Which of the three transport variants a server is reached over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Stdio,
    Sse,
    WebSocket,
}

/// An immutable server connection target (§3). One `ServerConfig` maps to at
/// most one live `Connection` per tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Logical name, unique within the owning tenant.
    pub name: String,
    pub tenant_id: TenantId,
    pub transport: TransportKind,
    /// Child-process command for `stdio`; ignored for `sse`/`websocket`.
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    /// Target URL for `sse`/`websocket`; ignored for `stdio`.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(with = "request_timeout_secs")]
    pub request_timeout: Duration,
    pub max_retries: u32,
}

mod request_timeout_secs {
    use super::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

/// The Connection lifecycle state machine (§3): `Idle → Connecting →
/// Handshaking → Ready → {Degraded, Closing} → Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Idle,
    Connecting,
    Handshaking,
    Ready,
    Degraded,
    Closing,
    Closed,
}

impl ConnectionState {
    /// Whether `self -> next` is a legal transition. Illegal transitions are
    /// a `GatewayError::Internal`, never a silent overwrite (§3.1).
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use ConnectionState::{Closed, Closing, Connecting, Degraded, Handshaking, Idle, Ready};
        matches!(
            (self, next),
            (Idle, Connecting)
                | (Connecting, Handshaking)
                | (Connecting, Degraded)
                | (Handshaking, Ready)
                | (Handshaking, Degraded)
                | (Ready, Degraded)
                | (Ready, Closing)
                | (Degraded, Connecting)
                | (Degraded, Closing)
                | (Closing, Closed)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_cannot_jump_straight_to_closed() {
        assert!(!ConnectionState::Ready.can_transition_to(ConnectionState::Closed));
        assert!(ConnectionState::Ready.can_transition_to(ConnectionState::Closing));
        assert!(ConnectionState::Closing.can_transition_to(ConnectionState::Closed));
    }

    #[test]
    fn degraded_can_retry_into_connecting() {
        assert!(ConnectionState::Degraded.can_transition_to(ConnectionState::Connecting));
    }
}
