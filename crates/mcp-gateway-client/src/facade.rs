//! Client Facade (C9, §4.9): the public API agents call — `connectServer`,
//! `listTools`, `callTool`, `readResource`, `serverStatus`,
//! `refreshCapabilities` — fanning out to every other component in the
//! order §2's data-flow line lays out: Policy Engine → Rate Limiter →
//! Approval Gate → Capability Cache → Connection Supervisor/Multiplexer/
//! Transport → Audit Sink on the way out, success or failure alike.
//!
//! `GatewayClient` is the `Arc`-wrapped handle every caller shares,
//! owning a `DashMap` of live connections, the per-tenant policy/rate-limiter
//! state, and one `AuditSink`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use mcp_gateway_audit::{AuditEntry, AuditEntryBuilder, AuditOperation, AuditOutcome, AuditSink};
use mcp_gateway_core::{
    ConnectionState, DenialReason, GatewayConfig, GatewayError, GatewayResult, ServerConfig,
    TenantId,
};
use mcp_gateway_policy::{
    ApprovalGate, ApprovalRequest, ApprovalResolver, GateOutcome, PolicyEngine, RateLimiterBucket,
    SecretAccessValidator, SecurityPolicy,
};
use mcp_gateway_protocol::methods::{RESOURCES_READ, TOOLS_CALL};

use crate::connection::Connection;
use crate::handle::{ResourceHandle, ToolHandle};
use crate::multiplexer::CallError;
use crate::supervisor::{ConnectionSupervisor, SupervisorParams};

/// `{state, lastPing, toolCount, resourceCount}` (§4.9).
#[derive(Debug, Clone)]
pub struct ServerStatus {
    pub state: ConnectionState,
    pub last_ping: Option<chrono::DateTime<Utc>>,
    pub tool_count: usize,
    pub resource_count: usize,
}

type ConnKey = (TenantId, String);

/// The process-wide tenant directory (§5.1): populated once at startup and
/// mutated only through `add_tenant`/`remove_tenant` — never implicitly.
pub struct GatewayClient {
    config: GatewayConfig,
    tenants: DashMap<TenantId, ()>,
    connections: DashMap<ConnKey, Arc<Connection>>,
    policies: DashMap<ConnKey, SecurityPolicy>,
    rate_limiters: DashMap<ConnKey, Arc<RateLimiterBucket>>,
    approval_gate: ApprovalGate,
    secret_validator: Box<dyn SecretAccessValidator>,
    audit: AuditSink,
}

impl GatewayClient {
    /// Construct explicitly at startup (§9: no process-wide mutable state
    /// beyond the tenant directory, which this call populates empty).
    /// `approval_resolver`/`secret_validator` are pluggable strategies the
    /// caller must supply deliberately — there is no implicit "grant
    /// everything" default wired in here.
    #[must_use]
    pub fn new(
        config: GatewayConfig,
        approval_resolver: Box<dyn ApprovalResolver>,
        secret_validator: Box<dyn SecretAccessValidator>,
    ) -> Self {
        let audit = AuditSink::spawn(
            std::path::PathBuf::from(&config.audit_log_path),
            config.audit_channel_capacity,
        );
        Self {
            config,
            tenants: DashMap::new(),
            connections: DashMap::new(),
            policies: DashMap::new(),
            rate_limiters: DashMap::new(),
            approval_gate: ApprovalGate::new(approval_resolver),
            secret_validator,
            audit,
        }
    }

    /// Build over an already-constructed `AuditSink`, so callers and tests
    /// that want a non-file sink (e.g. `AuditSink::spawn_with_writer`) can
    /// supply one without touching the filesystem.
    #[must_use]
    pub fn with_audit_sink(
        config: GatewayConfig,
        approval_resolver: Box<dyn ApprovalResolver>,
        secret_validator: Box<dyn SecretAccessValidator>,
        audit: AuditSink,
    ) -> Self {
        Self {
            config,
            tenants: DashMap::new(),
            connections: DashMap::new(),
            policies: DashMap::new(),
            rate_limiters: DashMap::new(),
            approval_gate: ApprovalGate::new(approval_resolver),
            secret_validator,
            audit,
        }
    }

    // ---- admin operations (§5.1) -----------------------------------

    pub fn add_tenant(&self, tenant_id: TenantId) {
        self.tenants.insert(tenant_id, ());
    }

    pub fn remove_tenant(&self, tenant_id: &TenantId) {
        self.tenants.remove(tenant_id);
        self.connections.retain(|(tid, _), _| tid != tenant_id);
        self.policies.retain(|(tid, _), _| tid != tenant_id);
        self.rate_limiters.retain(|(tid, _), _| tid != tenant_id);
    }

    /// Install or replace the `SecurityPolicy` for (tenant, server).
    /// Validated per §9 open question 3 before being accepted: a policy that
    /// sets `requireApproval` without an `approvalTimeout` is rejected here,
    /// at config-load time, not at first call.
    pub fn set_policy(&self, policy: SecurityPolicy) -> Result<(), GatewayError> {
        policy.validate().map_err(GatewayError::Internal)?;
        let key = (policy.tenant_id.clone(), policy.server.clone());
        self.policies.insert(key, policy);
        Ok(())
    }

    // ---- §4.9 public operations -------------------------------------

    /// `connectServer(cfg) -> bool` (§4.9). Runs the Policy Engine's
    /// server-access check before any transport I/O (§4.3 step 1).
    pub async fn connect_server(
        &self,
        tenant_id: &TenantId,
        server_config: ServerConfig,
        session_id: Option<&str>,
    ) -> GatewayResult<bool> {
        let server = server_config.name.clone();
        let result = self.connect_server_inner(tenant_id, server_config).await;
        let entry = Self::outcome_entry(
            tenant_id,
            session_id,
            AuditOperation::ConnectServer,
            &server,
            None,
            &result,
        );
        self.finish(entry, result.map(|()| true))
    }

    async fn connect_server_inner(
        &self,
        tenant_id: &TenantId,
        server_config: ServerConfig,
    ) -> GatewayResult<()> {
        let key = (tenant_id.clone(), server_config.name.clone());
        let policy = self
            .policies
            .get(&key)
            .map(|p| p.clone())
            .ok_or(GatewayError::Forbidden(DenialReason::UnknownServer))?;

        if PolicyEngine::requires_secret_tier_check(&policy)
            && !self
                .secret_validator
                .validate(tenant_id, &server_config.name)
                .await
        {
            return Err(GatewayError::Forbidden(DenialReason::SecretTierDenied));
        }

        let connection = Arc::new(Connection::new(server_config));
        self.connections.insert(key.clone(), Arc::clone(&connection));

        let params = SupervisorParams {
            health_probe_interval: self.config.health_probe_interval,
            health_probe_deadline: self.config.health_probe_deadline,
            reconnect_base_delay: self.config.reconnect_base_delay,
            reconnect_max_delay: self.config.reconnect_max_delay,
        };
        let result =
            ConnectionSupervisor::connect(connection, self.audit.clone(), tenant_id.clone(), params)
                .await;
        if result.is_err() {
            // The initial connect failed before a supervision task was ever
            // spawned — don't leave a zombie, unsupervised entry behind.
            self.connections.remove(&key);
        }
        result
    }

    /// `disconnectServer(name) -> bool` (§4.9). Idempotent: calling it twice
    /// both succeed; the second is a no-op (§8).
    pub async fn disconnect_server(
        &self,
        tenant_id: &TenantId,
        server: &str,
        session_id: Option<&str>,
    ) -> GatewayResult<bool> {
        let key = (tenant_id.clone(), server.to_string());
        if let Some((_, connection)) = self.connections.remove(&key) {
            let _ = connection.transition(ConnectionState::Closing);
            if let Some(runtime) = connection.runtime() {
                runtime.transport.close().await;
            }
            let _ = connection.transition(ConnectionState::Closed);
        }
        let entry = AuditEntry::builder(
            tenant_id.clone(),
            session_id.unwrap_or("default"),
            AuditOperation::DisconnectServer,
            server,
        )
        .outcome(AuditOutcome::Success)
        .build(Utc::now());
        self.finish(entry, Ok(true))
    }

    /// `listTools(name?) -> [Tool]` (§4.9). Lock-free capability-cache read,
    /// no I/O (§4.4).
    pub fn list_tools(
        &self,
        tenant_id: &TenantId,
        server: Option<&str>,
    ) -> GatewayResult<Vec<ToolHandle>> {
        match server {
            Some(name) => {
                let connection = self.require_connection(tenant_id, name)?;
                let snapshot = connection.capabilities.load();
                Ok(snapshot
                    .tools
                    .iter()
                    .cloned()
                    .map(|tool| ToolHandle {
                        server: name.to_string(),
                        tool,
                        epoch: snapshot.epoch,
                    })
                    .collect())
            }
            None => Ok(self
                .connections
                .iter()
                .filter(|entry| &entry.key().0 == tenant_id)
                .flat_map(|entry| {
                    let (_, server_name) = entry.key().clone();
                    let snapshot = entry.value().capabilities.load();
                    snapshot
                        .tools
                        .iter()
                        .cloned()
                        .map(move |tool| ToolHandle {
                            server: server_name.clone(),
                            tool,
                            epoch: snapshot.epoch,
                        })
                        .collect::<Vec<_>>()
                })
                .collect()),
        }
    }

    /// `listResources(name?) -> [Resource]` (§4.9).
    pub fn list_resources(
        &self,
        tenant_id: &TenantId,
        server: Option<&str>,
    ) -> GatewayResult<Vec<ResourceHandle>> {
        match server {
            Some(name) => {
                let connection = self.require_connection(tenant_id, name)?;
                let snapshot = connection.capabilities.load();
                Ok(snapshot
                    .resources
                    .iter()
                    .cloned()
                    .map(|resource| ResourceHandle {
                        server: name.to_string(),
                        resource,
                        epoch: snapshot.epoch,
                    })
                    .collect())
            }
            None => Ok(self
                .connections
                .iter()
                .filter(|entry| &entry.key().0 == tenant_id)
                .flat_map(|entry| {
                    let (_, server_name) = entry.key().clone();
                    let snapshot = entry.value().capabilities.load();
                    snapshot
                        .resources
                        .iter()
                        .cloned()
                        .map(move |resource| ResourceHandle {
                            server: server_name.clone(),
                            resource,
                            epoch: snapshot.epoch,
                        })
                        .collect::<Vec<_>>()
                })
                .collect()),
        }
    }

    /// `callTool(server, tool, args) -> JSON result` (§4.9). The full
    /// data-flow line from §2: Policy → Rate Limiter → Approval Gate →
    /// Capability Cache → Supervisor/Multiplexer/Transport → Audit, on
    /// success or failure alike.
    ///
    /// Takes a [`ToolHandle`] rather than a bare name: `listTools` mints the
    /// handle carrying the epoch its snapshot was taken under, and a handle
    /// minted before a reconnect is rejected as `UnknownTool` here, before
    /// any network activity — per handle.rs's stale-epoch contract.
    pub async fn call_tool(
        &self,
        tenant_id: &TenantId,
        handle: &ToolHandle,
        args: serde_json::Value,
        session_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> GatewayResult<serde_json::Value> {
        let server = handle.server.as_str();
        let tool = handle.name();
        let result = self
            .call_tool_inner(tenant_id, handle, &args, cancel)
            .await;
        let data_hash = mcp_gateway_audit::redacted_hash(&args);
        let entry = Self::outcome_entry(
            tenant_id,
            session_id,
            AuditOperation::CallTool,
            server,
            Some(tool),
            &result,
        )
        .data_hash(data_hash);
        self.finish(entry.build(Utc::now()), result)
    }

    async fn call_tool_inner(
        &self,
        tenant_id: &TenantId,
        handle: &ToolHandle,
        args: &serde_json::Value,
        cancel: &CancellationToken,
    ) -> GatewayResult<serde_json::Value> {
        let server = handle.server.as_str();
        let tool = handle.name();
        let policy = self.policy_for(tenant_id, server)?;
        PolicyEngine::validate_tool_access(&policy, tool).map_err(GatewayError::Forbidden)?;

        let bucket = self.rate_limiter_for(tenant_id, server, policy.requests_per_minute);
        PolicyEngine::check_rate_limit(&bucket).map_err(GatewayError::Forbidden)?;

        if policy.require_approval {
            let timeout = policy
                .approval_timeout
                .expect("SecurityPolicy::validate rejects requireApproval without a timeout");
            let request = ApprovalRequest {
                tenant_id: tenant_id.clone(),
                server: server.to_string(),
                tool: tool.to_string(),
                args: args.clone(),
            };
            match self
                .approval_gate
                .request_approval(request, timeout, cancel)
                .await
            {
                GateOutcome::Granted => {}
                GateOutcome::Denied => {
                    return Err(GatewayError::Forbidden(DenialReason::ApprovalDenied))
                }
                GateOutcome::TimedOut => {
                    return Err(GatewayError::Forbidden(DenialReason::ApprovalTimeout))
                }
                GateOutcome::Cancelled => return Err(GatewayError::Cancelled),
            }
        }

        let connection = self.require_connection(tenant_id, server)?;
        if connection.epoch() != handle.epoch {
            return Err(GatewayError::UnknownTool {
                server: server.to_string(),
                tool: tool.to_string(),
            });
        }
        let snapshot = connection.capabilities.load();
        if !snapshot.tools.iter().any(|t| t.name == tool) {
            return Err(GatewayError::UnknownTool {
                server: server.to_string(),
                tool: tool.to_string(),
            });
        }
        let runtime = connection
            .runtime()
            .ok_or_else(|| GatewayError::NotConnected {
                server: server.to_string(),
            })?;

        let params = serde_json::json!({ "name": tool, "arguments": args });
        let started = Instant::now();
        runtime
            .multiplexer
            .call(TOOLS_CALL, Some(params), connection.config.request_timeout, cancel)
            .await
            .map_err(|e| Self::map_call_error(e, server, started.elapsed()))
    }

    /// `readResource(server, uri) -> resource contents` (§4.9). Resource
    /// access has no rate-limit or approval sub-step — only the allow/deny
    /// glob check (§4.5). Takes a [`ResourceHandle`] for the same stale-epoch
    /// rejection `callTool` applies.
    pub async fn read_resource(
        &self,
        tenant_id: &TenantId,
        handle: &ResourceHandle,
        session_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> GatewayResult<serde_json::Value> {
        let server = handle.server.as_str();
        let uri = handle.uri();
        let result = self.read_resource_inner(tenant_id, handle, cancel).await;
        let entry = Self::outcome_entry(
            tenant_id,
            session_id,
            AuditOperation::ReadResource,
            server,
            Some(uri),
            &result,
        );
        self.finish(entry.build(Utc::now()), result)
    }

    async fn read_resource_inner(
        &self,
        tenant_id: &TenantId,
        handle: &ResourceHandle,
        cancel: &CancellationToken,
    ) -> GatewayResult<serde_json::Value> {
        let server = handle.server.as_str();
        let uri = handle.uri();
        let policy = self.policy_for(tenant_id, server)?;
        PolicyEngine::validate_resource_access(&policy, uri).map_err(GatewayError::Forbidden)?;

        let connection = self.require_connection(tenant_id, server)?;
        if connection.epoch() != handle.epoch {
            return Err(GatewayError::UnknownResource {
                server: server.to_string(),
                uri: uri.to_string(),
            });
        }
        let snapshot = connection.capabilities.load();
        if !snapshot.resources.iter().any(|r| r.uri == uri) {
            return Err(GatewayError::UnknownResource {
                server: server.to_string(),
                uri: uri.to_string(),
            });
        }
        let runtime = connection
            .runtime()
            .ok_or_else(|| GatewayError::NotConnected {
                server: server.to_string(),
            })?;

        let params = serde_json::json!({ "uri": uri });
        let started = Instant::now();
        runtime
            .multiplexer
            .call(
                RESOURCES_READ,
                Some(params),
                connection.config.request_timeout,
                cancel,
            )
            .await
            .map_err(|e| Self::map_call_error(e, server, started.elapsed()))
    }

    /// `serverStatus(name) -> {state, lastPing, toolCount, resourceCount}`
    /// (§4.9). No error variant in the Facade table — an unknown server
    /// just reports `Closed` with empty counts.
    #[must_use]
    pub fn server_status(&self, tenant_id: &TenantId, server: &str) -> ServerStatus {
        let key = (tenant_id.clone(), server.to_string());
        match self.connections.get(&key) {
            Some(connection) => {
                let snapshot = connection.capabilities.load();
                ServerStatus {
                    state: connection.state(),
                    last_ping: connection.last_ping(),
                    tool_count: snapshot.tools.len(),
                    resource_count: snapshot.resources.len(),
                }
            }
            None => ServerStatus {
                state: ConnectionState::Closed,
                last_ping: None,
                tool_count: 0,
                resource_count: 0,
            },
        }
    }

    /// `refreshCapabilities(name?)` (§4.9).
    pub async fn refresh_capabilities(
        &self,
        tenant_id: &TenantId,
        server: Option<&str>,
        session_id: Option<&str>,
    ) -> GatewayResult<()> {
        let targets: Vec<(String, Arc<Connection>)> = match server {
            Some(name) => vec![(name.to_string(), self.require_connection(tenant_id, name)?)],
            None => self
                .connections
                .iter()
                .filter(|entry| &entry.key().0 == tenant_id)
                .map(|entry| (entry.key().1.clone(), Arc::clone(entry.value())))
                .collect(),
        };

        for (name, connection) in targets {
            let result = self.refresh_one(&connection, &name).await;
            let entry = Self::outcome_entry(
                tenant_id,
                session_id,
                AuditOperation::RefreshCapabilities,
                &name,
                None,
                &result,
            );
            self.finish(entry.build(Utc::now()), result)?;
        }
        Ok(())
    }

    async fn refresh_one(&self, connection: &Arc<Connection>, name: &str) -> GatewayResult<()> {
        let runtime = connection
            .runtime()
            .ok_or_else(|| GatewayError::NotConnected {
                server: name.to_string(),
            })?;
        let epoch = connection.epoch();
        connection
            .capabilities
            .refresh(&runtime.multiplexer, epoch, connection.config.request_timeout)
            .await
            .map_err(|e| Self::map_call_error(e, name, Duration::ZERO))
    }

    // ---- shared helpers ------------------------------------------------

    fn policy_for(&self, tenant_id: &TenantId, server: &str) -> GatewayResult<SecurityPolicy> {
        self.policies
            .get(&(tenant_id.clone(), server.to_string()))
            .map(|p| p.clone())
            .ok_or(GatewayError::Forbidden(DenialReason::UnknownServer))
    }

    fn require_connection(&self, tenant_id: &TenantId, server: &str) -> GatewayResult<Arc<Connection>> {
        self.connections
            .get(&(tenant_id.clone(), server.to_string()))
            .map(|c| Arc::clone(c.value()))
            .ok_or_else(|| GatewayError::NotConnected {
                server: server.to_string(),
            })
    }

    fn rate_limiter_for(
        &self,
        tenant_id: &TenantId,
        server: &str,
        requests_per_minute: usize,
    ) -> Arc<RateLimiterBucket> {
        let key = (tenant_id.clone(), server.to_string());
        Arc::clone(
            self.rate_limiters
                .entry(key)
                .or_insert_with(|| Arc::new(RateLimiterBucket::new(requests_per_minute)))
                .value(),
        )
    }

    fn map_call_error(error: CallError, server: &str, elapsed: Duration) -> GatewayError {
        match error {
            CallError::Timeout => GatewayError::Timeout {
                elapsed_ms: elapsed.as_millis() as u64,
            },
            CallError::Cancelled => GatewayError::Cancelled,
            CallError::Disconnected => GatewayError::NotConnected {
                server: server.to_string(),
            },
            CallError::Rpc(err) => {
                GatewayError::ProtocolError(format!("{}: {}", err.code, err.message))
            }
            CallError::SendFailed(msg) => GatewayError::TransportError(msg),
        }
    }

    fn outcome_entry<T>(
        tenant_id: &TenantId,
        session_id: Option<&str>,
        operation: AuditOperation,
        server: &str,
        target: Option<&str>,
        result: &GatewayResult<T>,
    ) -> AuditEntryBuilder {
        let mut builder = AuditEntry::builder(
            tenant_id.clone(),
            session_id.unwrap_or("default"),
            operation,
            server,
        );
        if let Some(target) = target {
            builder = builder.target(target);
        }
        builder = match result {
            Ok(_) => builder.outcome(AuditOutcome::Success),
            Err(e) => {
                let outcome = if matches!(e, GatewayError::Forbidden(_)) {
                    AuditOutcome::Denied
                } else {
                    AuditOutcome::Error
                };
                let reason = e.denial_reason().unwrap_or(e.kind());
                builder.outcome(outcome).reason(reason)
            }
        };
        builder
    }

    /// Write the audit entry and apply §4.8's fail-closed backpressure rule:
    /// if the sink can't keep up, the *operation* fails even if `result`
    /// itself was `Ok` — auditability outranks availability here.
    fn finish<T>(&self, entry: AuditEntry, result: GatewayResult<T>) -> GatewayResult<T> {
        match self.audit.record(entry) {
            Ok(()) => result,
            Err(e) => Err(GatewayError::Internal(format!(
                "audit sink backpressured, failing operation closed: {e}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use mcp_gateway_core::{ConnectionEpoch, TransportKind};
    use mcp_gateway_policy::{AlwaysDenySecretValidator, AutoGrantResolver, SecurityLevel};
    use mcp_gateway_protocol::{Tool, MCP_PROTOCOL_VERSION};
    use mcp_gateway_transport::{MockTransport, Transport};

    use super::*;
    use crate::connection::Connection;
    use crate::supervisor::SupervisorParams;

    fn server_config(name: &str, tenant_id: &TenantId) -> ServerConfig {
        ServerConfig {
            name: name.to_string(),
            tenant_id: tenant_id.clone(),
            transport: TransportKind::Stdio,
            command: Some("unused-under-mock".to_string()),
            args: Vec::new(),
            url: None,
            env: std::collections::HashMap::new(),
            request_timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    fn policy(tenant_id: &TenantId, server: &str, denied_tools: &[&str]) -> SecurityPolicy {
        SecurityPolicy {
            tenant_id: tenant_id.clone(),
            server: server.to_string(),
            allowed_tools: HashSet::new(),
            denied_tools: denied_tools.iter().map(|t| t.to_string()).collect(),
            allowed_resources: vec!["file:///tmp/*".to_string()],
            denied_resources: Vec::new(),
            security_level: SecurityLevel::Public,
            requests_per_minute: 60,
            require_approval: false,
            approval_timeout: None,
            audit_all: true,
        }
    }

    fn test_client() -> GatewayClient {
        GatewayClient::with_audit_sink(
            GatewayConfig::default(),
            Box::new(AutoGrantResolver),
            Box::new(AlwaysDenySecretValidator),
            AuditSink::spawn_with_writer(tokio::io::sink(), 64),
        )
    }

    fn fast_supervisor_params() -> SupervisorParams {
        SupervisorParams {
            health_probe_interval: Duration::from_secs(3600),
            health_probe_deadline: Duration::from_secs(5),
            reconnect_base_delay: Duration::from_millis(1),
            reconnect_max_delay: Duration::from_millis(5),
        }
    }

    /// Answer the three handshake round trips (`initialize`, `tools/list`,
    /// `resources/list`) with an empty capability set, keyed to whatever
    /// live request id the Supervisor actually sent.
    async fn auto_respond_handshake(mock: std::sync::Arc<MockTransport>) {
        for _ in 0..3 {
            let (id, method) = mock.await_next_request().await;
            let result = match method.as_str() {
                "initialize" => serde_json::json!({
                    "protocolVersion": MCP_PROTOCOL_VERSION,
                    "serverInfo": {"name": "mock-server", "version": "0.0.0"},
                    "capabilities": {},
                }),
                "tools/list" => serde_json::json!({"tools": []}),
                "resources/list" => serde_json::json!({"resources": []}),
                other => panic!("unexpected handshake request {other:?}"),
            };
            let response =
                serde_json::json!({"jsonrpc": "2.0", "id": id, "result": result}).to_string();
            mock.deliver(response).await;
        }
    }

    /// Drive a connection to `Ready` over a `MockTransport`, register it
    /// directly in the client's connection table (bypassing `connect_server`,
    /// which only knows how to open a real stdio/SSE/WebSocket transport),
    /// and return the mock so the test can inspect `sent_frames()`.
    async fn connect_with_mock(
        client: &GatewayClient,
        tenant_id: &TenantId,
        server: &str,
    ) -> std::sync::Arc<MockTransport> {
        let mock = std::sync::Arc::new(MockTransport::new());
        let connection = Arc::new(Connection::new(server_config(server, tenant_id)));
        let inbound = mock.open().await.expect("mock transport never fails to open");
        let responder = tokio::spawn(auto_respond_handshake(std::sync::Arc::clone(&mock)));

        ConnectionSupervisor::connect_with_transport(
            Arc::clone(&connection),
            client.audit.clone(),
            tenant_id.clone(),
            fast_supervisor_params(),
            std::sync::Arc::clone(&mock) as Arc<dyn Transport>,
            inbound,
        )
        .await
        .expect("handshake over a mock transport succeeds");
        responder.await.expect("handshake responder does not panic");

        client
            .connections
            .insert((tenant_id.clone(), server.to_string()), connection);
        mock
    }

    fn tool_handle(server: &str, name: &str, epoch: ConnectionEpoch) -> ToolHandle {
        ToolHandle {
            server: server.to_string(),
            tool: Tool {
                name: name.to_string(),
                description: None,
                input_schema: serde_json::json!({}),
            },
            epoch,
        }
    }

    #[tokio::test]
    async fn denied_tool_call_never_reaches_the_transport() {
        let tenant_id = TenantId::new("acme");
        let client = test_client();
        client.add_tenant(tenant_id.clone());
        client
            .set_policy(policy(&tenant_id, "srv", &["danger"]))
            .expect("policy is internally consistent");
        let mock = connect_with_mock(&client, &tenant_id, "srv").await;

        let frames_before_denied_call = mock.sent_frames().len();
        let handle = tool_handle("srv", "danger", ConnectionEpoch(1));
        let cancel = CancellationToken::new();
        let result = client
            .call_tool(&tenant_id, &handle, serde_json::json!({}), None, &cancel)
            .await;

        assert!(matches!(
            result,
            Err(GatewayError::Forbidden(DenialReason::ToolExplicitlyDenied))
        ));
        assert_eq!(mock.sent_frames().len(), frames_before_denied_call);
    }

    #[tokio::test]
    async fn stale_epoch_handle_is_rejected_before_any_new_frame() {
        let tenant_id = TenantId::new("acme");
        let client = test_client();
        client.add_tenant(tenant_id.clone());
        client
            .set_policy(policy(&tenant_id, "srv", &[]))
            .expect("policy is internally consistent");
        let mock = connect_with_mock(&client, &tenant_id, "srv").await;

        let key = (tenant_id.clone(), "srv".to_string());
        let connection = client
            .connections
            .get(&key)
            .map(|c| Arc::clone(c.value()))
            .expect("connection was registered by connect_with_mock");
        assert_eq!(connection.epoch(), ConnectionEpoch(1));
        // Simulate a reconnect bumping the epoch past the one this handle
        // was minted under.
        connection.advance_epoch();

        let frames_before_stale_call = mock.sent_frames().len();
        let stale_handle = tool_handle("srv", "echo", ConnectionEpoch(1));
        let cancel = CancellationToken::new();
        let result = client
            .call_tool(&tenant_id, &stale_handle, serde_json::json!({}), None, &cancel)
            .await;

        assert!(matches!(result, Err(GatewayError::UnknownTool { .. })));
        assert_eq!(mock.sent_frames().len(), frames_before_stale_call);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let tenant_id = TenantId::new("acme");
        let client = test_client();
        client.add_tenant(tenant_id.clone());
        client
            .set_policy(policy(&tenant_id, "srv", &[]))
            .expect("policy is internally consistent");
        let _mock = connect_with_mock(&client, &tenant_id, "srv").await;

        let first = client.disconnect_server(&tenant_id, "srv", None).await;
        let second = client.disconnect_server(&tenant_id, "srv", None).await;
        assert_eq!(first.unwrap(), true);
        assert_eq!(second.unwrap(), true);
    }
}
