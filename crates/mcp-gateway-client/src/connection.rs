//! The `Connection` entity (§3): one per (tenant, server name), exclusively
//! owning a Transport Driver and Multiplexer pair across its lifetime,
//! including through reconnects.
//!
//! State lives behind a plain `std::sync::Mutex` for the (small, synchronous)
//! state-machine enum and an `ArcSwapOption` for the swappable
//! transport+multiplexer pair, following this workspace's hybrid-mutex rule:
//! nothing here is held across an `.await`.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};

use mcp_gateway_core::{ConnectionEpoch, ConnectionState, EpochCounter, GatewayError, ServerConfig};
use mcp_gateway_protocol::types::ServerInfo;
use mcp_gateway_transport::Transport;

use crate::capability::CapabilityCache;
use crate::multiplexer::RequestMultiplexer;

/// The live transport + multiplexer pair, swapped wholesale on reconnect.
pub struct ConnectionRuntime {
    pub transport: Arc<dyn Transport>,
    pub multiplexer: Arc<RequestMultiplexer>,
    pub server_info: ServerInfo,
}

/// One (tenant, server) connection (§3). Holds a transport driver handle, a
/// multiplexer, the last handshake's server info, a monotonically increasing
/// epoch, and the capability cache — everything the Facade needs to dispatch
/// a call without reaching into the Supervisor.
pub struct Connection {
    pub config: ServerConfig,
    state: StdMutex<ConnectionState>,
    runtime: ArcSwapOption<ConnectionRuntime>,
    epoch: EpochCounter,
    pub capabilities: CapabilityCache,
    last_ping_unix_ms: AtomicI64,
}

impl Connection {
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            state: StdMutex::new(ConnectionState::Idle),
            runtime: ArcSwapOption::from(None),
            epoch: EpochCounter::new(),
            capabilities: CapabilityCache::new(),
            last_ping_unix_ms: AtomicI64::new(0),
        }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.lock().expect("connection state mutex poisoned")
    }

    /// Validate and apply a state transition (§3.1): an illegal transition is
    /// a `GatewayError::Internal`, never a silent overwrite.
    pub fn transition(&self, next: ConnectionState) -> Result<(), GatewayError> {
        let mut guard = self.state.lock().expect("connection state mutex poisoned");
        if !guard.can_transition_to(next) {
            return Err(GatewayError::Internal(format!(
                "illegal connection state transition {:?} -> {:?} for server {:?}",
                *guard, next, self.config.name
            )));
        }
        *guard = next;
        Ok(())
    }

    #[must_use]
    pub fn epoch(&self) -> ConnectionEpoch {
        self.epoch.current()
    }

    pub fn advance_epoch(&self) -> ConnectionEpoch {
        self.epoch.advance()
    }

    #[must_use]
    pub fn runtime(&self) -> Option<Arc<ConnectionRuntime>> {
        self.runtime.load_full()
    }

    pub fn set_runtime(&self, runtime: ConnectionRuntime) {
        self.runtime.store(Some(Arc::new(runtime)));
    }

    pub fn clear_runtime(&self) {
        self.runtime.store(None);
    }

    pub fn record_ping(&self) {
        self.last_ping_unix_ms
            .store(Utc::now().timestamp_millis(), Ordering::SeqCst);
    }

    #[must_use]
    pub fn last_ping(&self) -> Option<DateTime<Utc>> {
        let millis = self.last_ping_unix_ms.load(Ordering::SeqCst);
        if millis == 0 {
            None
        } else {
            DateTime::from_timestamp_millis(millis)
        }
    }
}
