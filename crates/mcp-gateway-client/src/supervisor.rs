//! Connection Supervisor (C3, §4.3): owns the lifecycle per (tenant,
//! server) — opening the transport, running the `initialize` handshake,
//! priming the capability cache, and supervising reconnect-with-backoff and
//! health probes for the lifetime of the `Connection`.
//!
//! Exponential backoff with jitter, capped at `ServerConfig::max_retries`,
//! and a health-probe ticker that
//! drives the exact same "transition to Degraded, then reconnect" path a
//! transport I/O error does — there is one degrade-and-reconnect code path
//! regardless of which trigger fired it (§4.3.1).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

use mcp_gateway_audit::{AuditEntry, AuditOperation, AuditOutcome, AuditSink};
use mcp_gateway_core::{ConnectionState, GatewayError, ServerConfig, TenantId, TransportKind};
use mcp_gateway_protocol::methods::{INITIALIZE, PING};
use mcp_gateway_protocol::types::{ClientInfo, ServerInfo};
use mcp_gateway_protocol::{InitializeResult, MCP_PROTOCOL_VERSION};
use mcp_gateway_transport::{
    SseConfig, SseTransport, StdioConfig, StdioTransport, Transport, TransportMessage,
    TransportResult, WebSocketConfig, WebSocketTransport,
};

use crate::connection::{Connection, ConnectionRuntime};
use crate::multiplexer::RequestMultiplexer;

/// Reconnect/health-probe timing, sourced from `GatewayConfig` by the
/// Facade and threaded through so this module has no direct dependency on
/// `mcp-gateway-core`'s config type.
#[derive(Debug, Clone, Copy)]
pub struct SupervisorParams {
    pub health_probe_interval: Duration,
    pub health_probe_deadline: Duration,
    pub reconnect_base_delay: Duration,
    pub reconnect_max_delay: Duration,
}

pub struct ConnectionSupervisor;

impl ConnectionSupervisor {
    /// `connect()` (§4.3 steps 2-5, server-access check already performed by
    /// the caller per step 1): open the transport, handshake, prime
    /// capabilities, transition to `Ready`, then hand the connection off to a
    /// background supervision task that owns reconnect and health probing for
    /// the rest of its life.
    #[instrument(skip(connection, audit, params), fields(server = %connection.config.name))]
    pub async fn connect(
        connection: Arc<Connection>,
        audit: AuditSink,
        tenant_id: TenantId,
        params: SupervisorParams,
    ) -> Result<(), GatewayError> {
        connection.transition(ConnectionState::Connecting)?;
        Self::establish(&connection, &audit, &tenant_id).await?;
        tokio::spawn(Self::supervise(connection, audit, tenant_id, params));
        Ok(())
    }

    /// Test-only seam: run the same handshake/capability-priming/supervise
    /// sequence as [`Self::connect`], but against a transport the caller
    /// already opened (a [`mcp_gateway_transport::MockTransport`]) instead of
    /// [`Self::open_transport`]'s real stdio/SSE/WebSocket construction.
    #[cfg(test)]
    pub(crate) async fn connect_with_transport(
        connection: Arc<Connection>,
        audit: AuditSink,
        tenant_id: TenantId,
        params: SupervisorParams,
        transport: Arc<dyn Transport>,
        inbound: mpsc::Receiver<TransportResult<TransportMessage>>,
    ) -> Result<(), GatewayError> {
        connection.transition(ConnectionState::Connecting)?;
        Self::establish_with_transport(&connection, transport, inbound).await?;
        tokio::spawn(Self::supervise(connection, audit, tenant_id, params));
        Ok(())
    }

    /// Open a transport, handshake, and refresh capabilities — shared by the
    /// initial connect and every reconnect attempt.
    async fn establish(
        connection: &Arc<Connection>,
        audit: &AuditSink,
        tenant_id: &TenantId,
    ) -> Result<(), GatewayError> {
        let (transport, inbound) = Self::open_transport(&connection.config, audit, tenant_id)
            .await
            .inspect_err(|_| {
                let _ = connection.transition(ConnectionState::Degraded);
            })?;
        Self::establish_with_transport(connection, transport, inbound).await
    }

    /// The handshake/capability-priming half of `establish()`, taking an
    /// already-opened transport — shared with tests that inject a
    /// [`mcp_gateway_transport::MockTransport`] in place of
    /// [`Self::open_transport`]'s real stdio/SSE/WebSocket construction.
    async fn establish_with_transport(
        connection: &Arc<Connection>,
        transport: Arc<dyn Transport>,
        inbound: mpsc::Receiver<TransportResult<TransportMessage>>,
    ) -> Result<(), GatewayError> {
        connection.transition(ConnectionState::Handshaking)?;

        let (notif_tx, _notif_rx) = mpsc::channel(64);
        let multiplexer = Arc::new(RequestMultiplexer::spawn(
            Arc::clone(&transport),
            inbound,
            notif_tx,
        ));

        let server_info = match Self::handshake(&multiplexer, &connection.config).await {
            Ok(info) => info,
            Err(e) => {
                let _ = connection.transition(ConnectionState::Degraded);
                return Err(e);
            }
        };

        connection.set_runtime(ConnectionRuntime {
            transport,
            multiplexer: Arc::clone(&multiplexer),
            server_info,
        });
        connection.transition(ConnectionState::Ready)?;

        let epoch = connection.advance_epoch();
        connection
            .capabilities
            .refresh(&multiplexer, epoch, connection.config.request_timeout)
            .await
            .map_err(|e| GatewayError::TransportError(format!("{e:?}")))?;

        Ok(())
    }

    async fn open_transport(
        config: &ServerConfig,
        audit: &AuditSink,
        tenant_id: &TenantId,
    ) -> Result<
        (
            Arc<dyn Transport>,
            mpsc::Receiver<TransportResult<TransportMessage>>,
        ),
        GatewayError,
    > {
        match config.transport {
            TransportKind::Stdio => {
                let stdio = Arc::new(StdioTransport::new(StdioConfig {
                    command: config.command.clone().unwrap_or_default(),
                    args: config.args.clone(),
                    env: config
                        .env
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect(),
                    startup_timeout: config.request_timeout,
                    ..StdioConfig::default()
                }));
                let inbound = stdio
                    .open()
                    .await
                    .map_err(|e| GatewayError::TransportError(e.to_string()))?;

                if let Some(stderr_rx) = stdio.take_stderr() {
                    tokio::spawn(Self::drain_stderr(
                        stderr_rx,
                        audit.clone(),
                        tenant_id.clone(),
                        config.name.clone(),
                    ));
                }
                Ok((stdio as Arc<dyn Transport>, inbound))
            }
            TransportKind::Sse => {
                let sse = Arc::new(SseTransport::new(SseConfig {
                    base_url: config.url.clone().unwrap_or_default(),
                    request_timeout: config.request_timeout,
                    ..SseConfig::default()
                }));
                let inbound = sse
                    .open()
                    .await
                    .map_err(|e| GatewayError::TransportError(e.to_string()))?;
                Ok((sse as Arc<dyn Transport>, inbound))
            }
            TransportKind::WebSocket => {
                let ws = Arc::new(WebSocketTransport::new(WebSocketConfig {
                    url: config.url.clone().unwrap_or_default(),
                    ..WebSocketConfig::default()
                }));
                let inbound = ws
                    .open()
                    .await
                    .map_err(|e| GatewayError::TransportError(e.to_string()))?;
                Ok((ws as Arc<dyn Transport>, inbound))
            }
        }
    }

    /// Forward each stderr line from a stdio child into the Audit Sink
    /// tagged `transport_stderr` (§4.1).
    async fn drain_stderr(
        mut stderr_rx: mpsc::Receiver<String>,
        audit: AuditSink,
        tenant_id: TenantId,
        server: String,
    ) {
        while let Some(line) = stderr_rx.recv().await {
            let entry = AuditEntry::builder(
                tenant_id.clone(),
                "transport".to_string(),
                AuditOperation::ConnectServer,
                server.clone(),
            )
            .target("transport_stderr")
            .outcome(AuditOutcome::Success)
            .reason(line)
            .build(chrono::Utc::now());
            let _ = audit.record(entry);
        }
    }

    /// Send `initialize` with client info and `MCP_PROTOCOL_VERSION`;
    /// expect server info + capability advertisement (§4.3 step 3).
    async fn handshake(
        multiplexer: &RequestMultiplexer,
        config: &ServerConfig,
    ) -> Result<ServerInfo, GatewayError> {
        let params = serde_json::json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "clientInfo": ClientInfo {
                name: "mcp-gateway".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            "capabilities": {},
        });

        let cancel = CancellationToken::new();
        let result = multiplexer
            .call(INITIALIZE, Some(params), config.request_timeout, &cancel)
            .await
            .map_err(|e| GatewayError::HandshakeFailed {
                reason: format!("{e:?}"),
            })?;

        let parsed: InitializeResult =
            serde_json::from_value(result).map_err(|e| GatewayError::HandshakeFailed {
                reason: format!("malformed initialize result: {e}"),
            })?;
        Ok(parsed.server_info)
    }

    /// Background task: races the multiplexer's disconnect signal against a
    /// health-probe ticker. Either trigger degrades the connection and
    /// attempts a bounded, backed-off reconnect; running out of retries
    /// parks the connection in `Closed` rather than retrying forever.
    async fn supervise(
        connection: Arc<Connection>,
        audit: AuditSink,
        tenant_id: TenantId,
        params: SupervisorParams,
    ) {
        loop {
            let Some(runtime) = connection.runtime() else {
                return;
            };
            let disconnected = runtime.multiplexer.disconnected.clone();

            tokio::select! {
                () = disconnected.cancelled() => {
                    warn!(server = %connection.config.name, "transport disconnected");
                }
                () = tokio::time::sleep(params.health_probe_interval) => {
                    let cancel = CancellationToken::new();
                    let probe = runtime
                        .multiplexer
                        .call(PING, None, params.health_probe_deadline, &cancel)
                        .await;
                    if probe.is_ok() {
                        connection.record_ping();
                        continue;
                    }
                    warn!(server = %connection.config.name, "health probe missed");
                }
            }

            if connection.transition(ConnectionState::Degraded).is_err() {
                return;
            }
            connection.clear_runtime();

            if Self::reconnect_with_backoff(&connection, &audit, &tenant_id, &params).await {
                continue;
            }

            let _ = connection.transition(ConnectionState::Closing);
            let _ = connection.transition(ConnectionState::Closed);
            return;
        }
    }

    /// Exponential backoff with jitter, capped at `ServerConfig::max_retries`
    /// attempts and `reconnect_max_delay` per attempt (§4.3, §4.3.1).
    async fn reconnect_with_backoff(
        connection: &Arc<Connection>,
        audit: &AuditSink,
        tenant_id: &TenantId,
        params: &SupervisorParams,
    ) -> bool {
        let max_retries = connection.config.max_retries;
        let base_ms = params.reconnect_base_delay.as_millis().max(1) as u64;
        let cap_ms = params.reconnect_max_delay.as_millis().max(base_ms as u128) as u64;

        for attempt in 0..max_retries {
            let backoff_ms = base_ms
                .saturating_mul(1u64 << attempt.min(20))
                .min(cap_ms);
            let jitter_ms = fastrand::u64(0..=(backoff_ms / 4).max(1));
            tokio::time::sleep(Duration::from_millis(backoff_ms + jitter_ms)).await;

            if connection.transition(ConnectionState::Connecting).is_err() {
                return false;
            }
            match Self::establish(connection, audit, tenant_id).await {
                Ok(()) => return true,
                Err(e) => {
                    warn!(
                        server = %connection.config.name,
                        attempt,
                        error = %e,
                        "reconnect attempt failed"
                    );
                }
            }
        }
        false
    }
}
