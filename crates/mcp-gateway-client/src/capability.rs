//! Capability Cache (C4, §4.4): per-Connection snapshots of tool and
//! resource lists, refreshed after handshake, on explicit request, or
//! opportunistically on a `capabilities_changed` notification.
//!
//! Reads are lock-free via `arc_swap::ArcSwap` snapshot swap; a refresh lock
//! (a `tokio::sync::Mutex<()>`, crossed by `.await`) serializes the refresh
//! path itself so two concurrent `refreshCapabilities` calls never interleave
//! two `tools/list`/`resources/list` round trips (§4.4.1).

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio_util::sync::CancellationToken;

use mcp_gateway_core::ConnectionEpoch;
use mcp_gateway_protocol::methods::{RESOURCES_LIST, TOOLS_LIST};
use mcp_gateway_protocol::{Resource, Tool};

use crate::multiplexer::{CallError, RequestMultiplexer};

/// An atomically-swapped whole: readers never observe a torn mix of old
/// tools and new resources (§4.4.1).
#[derive(Debug, Clone)]
pub struct CapabilitySnapshot {
    pub epoch: ConnectionEpoch,
    pub tools: Vec<Tool>,
    pub resources: Vec<Resource>,
}

impl Default for CapabilitySnapshot {
    fn default() -> Self {
        Self {
            epoch: ConnectionEpoch(0),
            tools: Vec::new(),
            resources: Vec::new(),
        }
    }
}

pub struct CapabilityCache {
    snapshot: ArcSwap<CapabilitySnapshot>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl CapabilityCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(CapabilitySnapshot::default()),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Lock-free read of the current snapshot.
    #[must_use]
    pub fn load(&self) -> Arc<CapabilitySnapshot> {
        self.snapshot.load_full()
    }

    /// Refresh by issuing `tools/list` and `resources/list` against the
    /// supplied multiplexer, then swap the whole snapshot in atomically,
    /// tagged with the connection epoch it was fetched under.
    pub async fn refresh(
        &self,
        multiplexer: &RequestMultiplexer,
        epoch: ConnectionEpoch,
        deadline: Duration,
    ) -> Result<(), CallError> {
        let _guard = self.refresh_lock.lock().await;
        let cancel = CancellationToken::new();

        let tools_result = multiplexer
            .call(TOOLS_LIST, None, deadline, &cancel)
            .await?;
        let tools: Vec<Tool> = tools_result
            .get("tools")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| CallError::SendFailed(format!("malformed tools/list result: {e}")))?
            .unwrap_or_default();

        let resources_result = multiplexer
            .call(RESOURCES_LIST, None, deadline, &cancel)
            .await?;
        let resources: Vec<Resource> = resources_result
            .get("resources")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| CallError::SendFailed(format!("malformed resources/list result: {e}")))?
            .unwrap_or_default();

        self.snapshot.store(Arc::new(CapabilitySnapshot {
            epoch,
            tools,
            resources,
        }));
        Ok(())
    }
}

impl Default for CapabilityCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_snapshot_is_empty_at_epoch_zero() {
        let cache = CapabilityCache::new();
        let snapshot = cache.load();
        assert_eq!(snapshot.epoch, ConnectionEpoch(0));
        assert!(snapshot.tools.is_empty());
        assert!(snapshot.resources.is_empty());
    }
}
