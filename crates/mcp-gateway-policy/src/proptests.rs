//! Property tests pinning down the §4.5 allow/deny tie-break asymmetry
//! across randomly generated tool/resource names and allow/deny sets.

#![cfg(test)]

use std::collections::HashSet;

use proptest::prelude::*;

use mcp_gateway_core::{DenialReason, TenantId};

use crate::policy::{PolicyEngine, SecurityLevel, SecurityPolicy};

fn arb_name() -> impl Strategy<Value = String> {
    "[a-z]{1,8}"
}

fn policy_with(allowed_tools: HashSet<String>, denied_tools: HashSet<String>) -> SecurityPolicy {
    SecurityPolicy {
        tenant_id: TenantId::new("acme"),
        server: "srv1".into(),
        allowed_tools,
        denied_tools,
        allowed_resources: Vec::new(),
        denied_resources: Vec::new(),
        security_level: SecurityLevel::Public,
        requests_per_minute: 60,
        require_approval: false,
        approval_timeout: None,
        audit_all: false,
    }
}

proptest! {
    /// An empty `allowedTools` never denies on the allow-list check, no
    /// matter what `deniedTools` contains or which name is probed.
    #[test]
    fn empty_allow_list_never_produces_not_in_allow_list(
        tool in arb_name(),
        denied in prop::collection::hash_set(arb_name(), 0..5),
    ) {
        let policy = policy_with(HashSet::new(), denied);
        let result = PolicyEngine::validate_tool_access(&policy, &tool);
        prop_assert_ne!(result.err(), Some(DenialReason::ToolNotInAllowList));
    }

    /// A non-empty `deniedTools` containing the probed tool always wins,
    /// regardless of whether the same tool also appears in `allowedTools`.
    #[test]
    fn denied_tool_always_wins_over_allowed(
        tool in arb_name(),
        extra_allowed in prop::collection::hash_set(arb_name(), 0..5),
    ) {
        let mut allowed = extra_allowed;
        allowed.insert(tool.clone());
        let mut denied = HashSet::new();
        denied.insert(tool.clone());

        let policy = policy_with(allowed, denied);
        prop_assert_eq!(
            PolicyEngine::validate_tool_access(&policy, &tool),
            Err(DenialReason::ToolExplicitlyDenied)
        );
    }

    /// A non-empty `allowedTools` that excludes the probed name always denies
    /// with `ToolNotInAllowList` (unless the name also happens to be denied,
    /// which is covered by the previous property).
    #[test]
    fn nonempty_allow_list_excludes_absent_names(
        tool in arb_name(),
        allowed in prop::collection::hash_set(arb_name(), 1..5),
    ) {
        prop_assume!(!allowed.contains(&tool));
        let policy = policy_with(allowed, HashSet::new());
        prop_assert_eq!(
            PolicyEngine::validate_tool_access(&policy, &tool),
            Err(DenialReason::ToolNotInAllowList)
        );
    }

    /// An empty `allowedResources` denies every URI — the opposite default
    /// from the tool allow-list, by design (§4.5, §9 open question 1).
    #[test]
    fn empty_allowed_resources_denies_every_uri(uri in "[a-z:/]{1,16}") {
        let mut policy = policy_with(HashSet::new(), HashSet::new());
        policy.allowed_resources.clear();
        prop_assert_eq!(
            PolicyEngine::validate_resource_access(&policy, &uri),
            Err(DenialReason::NoResourcePatternMatched)
        );
    }
}
