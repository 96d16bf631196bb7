//! Identity newtypes shared across the gateway.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// A security principal owning a set of policies. All operations are scoped
/// by tenant; tenant-keyed maps never cross tenants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TenantId(String);

impl TenantId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TenantId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TenantId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A client-generated JSON-RPC request id. The wire protocol requires a
/// string id (§6); we mint one UUIDv4 per outbound request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(String);

impl RequestId {
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A monotonic counter bumped on each successful (re)handshake. Tool and
/// resource handles carry the epoch they were minted under; a lookup against
/// a stale epoch is rejected rather than silently served from a dead
/// connection (§4.3, scenario 6 in §8).
#[derive(Debug, Default)]
pub struct EpochCounter(AtomicU64);

impl EpochCounter {
    #[must_use]
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Bump the epoch and return the new value.
    pub fn advance(&self) -> ConnectionEpoch {
        ConnectionEpoch(self.0.fetch_add(1, Ordering::SeqCst) + 1)
    }

    #[must_use]
    pub fn current(&self) -> ConnectionEpoch {
        ConnectionEpoch(self.0.load(Ordering::SeqCst))
    }
}

/// A snapshot of an [`EpochCounter`] at a point in time, attached to every
/// `Tool`/`Resource` handle and compared against the live counter on use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionEpoch(pub u64);

impl fmt::Display for ConnectionEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_advances_monotonically() {
        let counter = EpochCounter::new();
        assert_eq!(counter.current(), ConnectionEpoch(0));
        assert_eq!(counter.advance(), ConnectionEpoch(1));
        assert_eq!(counter.advance(), ConnectionEpoch(2));
        assert_eq!(counter.current(), ConnectionEpoch(2));
    }

    #[test]
    fn request_ids_are_unique() {
        let a = RequestId::new();
        let b = RequestId::new();
        assert_ne!(a, b);
    }
}
