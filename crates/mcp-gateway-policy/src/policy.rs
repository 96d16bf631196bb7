//! Policy Engine (C5, §4.5): a pure decision function over a snapshot of
//! [`SecurityPolicy`]. No I/O during evaluation — rate-limiting and approval
//! are the only sub-steps that can themselves suspend.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use mcp_gateway_core::{DenialReason, TenantId};

use crate::rate_limit::RateLimiterBucket;

/// The four-tier trust classification a server can carry (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    Public,
    Restricted,
    Confidential,
    Secret,
}

/// Per (tenant, server) access policy (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityPolicy {
    pub tenant_id: TenantId,
    pub server: String,
    #[serde(default)]
    pub allowed_tools: HashSet<String>,
    #[serde(default)]
    pub denied_tools: HashSet<String>,
    /// Glob patterns (`*`, `?`), matched with `glob-match`.
    #[serde(default)]
    pub allowed_resources: Vec<String>,
    #[serde(default)]
    pub denied_resources: Vec<String>,
    pub security_level: SecurityLevel,
    pub requests_per_minute: usize,
    #[serde(default)]
    pub require_approval: bool,
    /// Required whenever `require_approval` is set (§9 open question 3,
    /// resolved); `GatewayConfig` validation rejects a policy that sets one
    /// without the other at load time rather than at first call.
    #[serde(default)]
    pub approval_timeout: Option<Duration>,
    #[serde(default)]
    pub audit_all: bool,
}

impl SecurityPolicy {
    /// Validate internal consistency (§9 open question 3). Called at
    /// config-load time, not lazily on first use.
    pub fn validate(&self) -> Result<(), String> {
        if self.require_approval && self.approval_timeout.is_none() {
            return Err(format!(
                "policy for tenant {:?} server {:?} sets requireApproval without an approval_timeout",
                self.tenant_id, self.server
            ));
        }
        Ok(())
    }
}

/// Pure decision functions over a `SecurityPolicy` snapshot (§4.5). Owns no
/// mutable state of its own beyond the per-(tenant, server) rate-limiter
/// buckets, which are themselves synchronous and lock-free to callers.
#[derive(Debug, Default)]
pub struct PolicyEngine;

impl PolicyEngine {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// `validateServerAccess` (§4.5). The secret-tier hook itself lives in
    /// `mcp-gateway-client`'s connect sequence (it needs the async
    /// `SecretAccessValidator`); this just reports whether the tier demands
    /// that extra check.
    #[must_use]
    pub fn requires_secret_tier_check(policy: &SecurityPolicy) -> bool {
        policy.security_level == SecurityLevel::Secret
    }

    /// `validateToolAccess` (§4.5), minus the rate-limit and approval
    /// sub-steps (those need async/shared state and are orchestrated by the
    /// caller). Resolved per §9: an empty `allowedTools` never denies — it
    /// means "no allow-list filter applied", not "deny all".
    pub fn validate_tool_access(policy: &SecurityPolicy, tool: &str) -> Result<(), DenialReason> {
        if policy.denied_tools.contains(tool) {
            return Err(DenialReason::ToolExplicitlyDenied);
        }
        if !policy.allowed_tools.is_empty() && !policy.allowed_tools.contains(tool) {
            return Err(DenialReason::ToolNotInAllowList);
        }
        Ok(())
    }

    /// `validateResourceAccess` (§4.5). Resolved per §9: unlike tool access,
    /// an empty `allowedResources` means deny-all — the allow flag starts
    /// false and only flips true when a pattern actually matches.
    pub fn validate_resource_access(policy: &SecurityPolicy, uri: &str) -> Result<(), DenialReason> {
        if policy
            .denied_resources
            .iter()
            .any(|pattern| glob_match::glob_match(pattern, uri))
        {
            return Err(DenialReason::ResourceExplicitlyDenied);
        }

        let allowed = policy
            .allowed_resources
            .iter()
            .any(|pattern| glob_match::glob_match(pattern, uri));
        if !allowed {
            return Err(DenialReason::NoResourcePatternMatched);
        }
        Ok(())
    }

    /// Consult the rate limiter for (tenant, server); separated from
    /// `validate_tool_access` because the bucket is shared, mutable state the
    /// caller owns (one bucket per (tenant, server), not per call).
    #[must_use]
    pub fn check_rate_limit(bucket: &RateLimiterBucket) -> Result<(), DenialReason> {
        if bucket.try_acquire() {
            Ok(())
        } else {
            Err(DenialReason::RateLimited)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(allowed_tools: &[&str], denied_tools: &[&str]) -> SecurityPolicy {
        SecurityPolicy {
            tenant_id: TenantId::new("acme"),
            server: "srv1".into(),
            allowed_tools: allowed_tools.iter().map(|s| s.to_string()).collect(),
            denied_tools: denied_tools.iter().map(|s| s.to_string()).collect(),
            allowed_resources: Vec::new(),
            denied_resources: Vec::new(),
            security_level: SecurityLevel::Public,
            requests_per_minute: 60,
            require_approval: false,
            approval_timeout: None,
            audit_all: false,
        }
    }

    #[test]
    fn empty_allowed_tools_means_no_filter() {
        let p = policy(&[], &[]);
        assert!(PolicyEngine::validate_tool_access(&p, "anything").is_ok());
    }

    #[test]
    fn nonempty_allowed_tools_excludes_unlisted_names() {
        let p = policy(&["echo"], &[]);
        assert!(PolicyEngine::validate_tool_access(&p, "echo").is_ok());
        assert_eq!(
            PolicyEngine::validate_tool_access(&p, "delete"),
            Err(DenialReason::ToolNotInAllowList)
        );
    }

    #[test]
    fn denied_tools_wins_even_if_also_allowed() {
        let mut p = policy(&["echo"], &["echo"]);
        p.denied_tools.insert("echo".to_string());
        assert_eq!(
            PolicyEngine::validate_tool_access(&p, "echo"),
            Err(DenialReason::ToolExplicitlyDenied)
        );
    }

    #[test]
    fn empty_allowed_resources_denies_every_uri() {
        let mut p = policy(&[], &[]);
        p.allowed_resources.clear();
        assert_eq!(
            PolicyEngine::validate_resource_access(&p, "file:///etc/passwd"),
            Err(DenialReason::NoResourcePatternMatched)
        );
    }

    #[test]
    fn glob_pattern_matches_allow_resource() {
        let mut p = policy(&[], &[]);
        p.allowed_resources.push("file:///data/*".to_string());
        assert!(PolicyEngine::validate_resource_access(&p, "file:///data/report.csv").is_ok());
        assert_eq!(
            PolicyEngine::validate_resource_access(&p, "file:///etc/passwd"),
            Err(DenialReason::NoResourcePatternMatched)
        );
    }

    #[test]
    fn denied_resource_glob_wins_over_allow() {
        let mut p = policy(&[], &[]);
        p.allowed_resources.push("file:///data/*".to_string());
        p.denied_resources.push("file:///data/secret.csv".to_string());
        assert_eq!(
            PolicyEngine::validate_resource_access(&p, "file:///data/secret.csv"),
            Err(DenialReason::ResourceExplicitlyDenied)
        );
    }

    #[test]
    fn policy_requiring_approval_without_timeout_fails_validation() {
        let mut p = policy(&[], &[]);
        p.require_approval = true;
        assert!(p.validate().is_err());
        p.approval_timeout = Some(Duration::from_secs(30));
        assert!(p.validate().is_ok());
    }
}
