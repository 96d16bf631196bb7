//! The append-only audit record (§3, §4.8).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mcp_gateway_core::TenantId;

/// What kind of operation produced this entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOperation {
    ConnectServer,
    DisconnectServer,
    ListTools,
    ListResources,
    CallTool,
    ReadResource,
    RefreshCapabilities,
}

/// Whether the audited operation succeeded, was denied by policy, or failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Denied,
    Error,
}

/// One append-only record (§3: "timestamp, tenant id, session id, operation
/// kind, server name, tool/resource identifier, outcome, error reason, hashed
/// payload"). Derives `Serialize` only — entries are written, never parsed
/// back by this process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub tenant_id: TenantId,
    pub session_id: String,
    pub operation: AuditOperation,
    pub server: String,
    /// The tool name or resource URI the operation targeted, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub outcome: AuditOutcome,
    /// A `DenialReason::as_str()` or `GatewayError::kind()`, if the outcome
    /// was not `Success`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// SHA-256 hash (first 16 hex chars) of the redacted argument map, if
    /// this operation carried arguments (`callTool`) or result payload
    /// worth correlating without re-exposing it (§4.8).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_hash: Option<String>,
}

impl AuditEntry {
    #[must_use]
    pub fn builder(
        tenant_id: TenantId,
        session_id: impl Into<String>,
        operation: AuditOperation,
        server: impl Into<String>,
    ) -> AuditEntryBuilder {
        AuditEntryBuilder {
            tenant_id,
            session_id: session_id.into(),
            operation,
            server: server.into(),
            target: None,
            outcome: AuditOutcome::Success,
            reason: None,
            data_hash: None,
        }
    }
}

/// Builder so call sites don't juggle an eight-field struct literal at every
/// audit point in the Facade.
pub struct AuditEntryBuilder {
    tenant_id: TenantId,
    session_id: String,
    operation: AuditOperation,
    server: String,
    target: Option<String>,
    outcome: AuditOutcome,
    reason: Option<String>,
    data_hash: Option<String>,
}

impl AuditEntryBuilder {
    #[must_use]
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    #[must_use]
    pub fn outcome(mut self, outcome: AuditOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    #[must_use]
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[must_use]
    pub fn data_hash(mut self, hash: impl Into<String>) -> Self {
        self.data_hash = Some(hash.into());
        self
    }

    /// Finalize with the current time. The caller supplies `timestamp`
    /// separately rather than this builder calling `Utc::now()` so tests can
    /// construct deterministic entries.
    #[must_use]
    pub fn build(self, timestamp: DateTime<Utc>) -> AuditEntry {
        AuditEntry {
            timestamp,
            tenant_id: self.tenant_id,
            session_id: self.session_id,
            operation: self.operation,
            server: self.server,
            target: self.target,
            outcome: self.outcome,
            reason: self.reason,
            data_hash: self.data_hash,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_omits_absent_optional_fields_from_json() {
        let entry = AuditEntry::builder(TenantId::new("acme"), "sess-1", AuditOperation::ListTools, "srv1")
            .build(Utc::now());
        let json = serde_json::to_string(&entry).expect("serializes");
        assert!(!json.contains("target"));
        assert!(!json.contains("dataHash"));
    }

    #[test]
    fn builder_includes_provided_optional_fields() {
        let entry = AuditEntry::builder(TenantId::new("acme"), "sess-1", AuditOperation::CallTool, "srv1")
            .target("login")
            .outcome(AuditOutcome::Denied)
            .reason("tool_denied")
            .data_hash("0123456789abcdef")
            .build(Utc::now());
        let json = serde_json::to_string(&entry).expect("serializes");
        assert!(json.contains("\"target\":\"login\""));
        assert!(json.contains("\"dataHash\":\"0123456789abcdef\""));
        assert!(json.contains("\"reason\":\"tool_denied\""));
    }
}
