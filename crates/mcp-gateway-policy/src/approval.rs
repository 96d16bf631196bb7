//! Approval Gate (C7, §4.7): for policies marked `requireApproval`, blocks a
//! call until an external decision arrives or the policy's timeout fires.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use mcp_gateway_core::TenantId;

/// The inputs an `ApprovalResolver` needs to decide.
#[derive(Debug, Clone)]
pub struct ApprovalRequest {
    pub tenant_id: TenantId,
    pub server: String,
    pub tool: String,
    pub args: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    Granted,
    Denied,
}

/// Pluggable human-or-system-in-the-loop authorizer. The default
/// implementation ([`AutoGrantResolver`]) grants immediately and is
/// explicitly documented as a demo policy — wiring it into a production
/// `GatewayConfig` is a deliberate choice, never an implicit default someone
/// can fall into unnoticed.
#[async_trait]
pub trait ApprovalResolver: Send + Sync {
    async fn resolve(&self, request: ApprovalRequest) -> ApprovalDecision;
}

/// Grants every request immediately. This is a demo/no-op policy: real
/// deployments that set `requireApproval` must supply a resolver that
/// actually consults a human or an external system.
#[derive(Debug, Default)]
pub struct AutoGrantResolver;

#[async_trait]
impl ApprovalResolver for AutoGrantResolver {
    async fn resolve(&self, _request: ApprovalRequest) -> ApprovalDecision {
        ApprovalDecision::Granted
    }
}

/// The outcome of a gated call: granted, denied, or the configured timeout
/// elapsed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Granted,
    Denied,
    TimedOut,
    Cancelled,
}

pub struct ApprovalGate {
    resolver: Box<dyn ApprovalResolver>,
}

impl ApprovalGate {
    #[must_use]
    pub fn new(resolver: Box<dyn ApprovalResolver>) -> Self {
        Self { resolver }
    }

    /// Races the resolver's decision against `timeout` and `cancel`, the same
    /// three-way `tokio::select!` shape the Request Multiplexer uses for
    /// `call()` — so a blocked approval stays cancellable without leaking a
    /// task (§4.7.1).
    pub async fn request_approval(
        &self,
        request: ApprovalRequest,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> GateOutcome {
        let (tx, rx) = oneshot::channel();
        let resolver_future = self.resolver.resolve(request);

        tokio::select! {
            decision = resolver_future => {
                let _ = tx.send(decision);
                match decision {
                    ApprovalDecision::Granted => GateOutcome::Granted,
                    ApprovalDecision::Denied => GateOutcome::Denied,
                }
            }
            () = tokio::time::sleep(timeout) => {
                warn!("approval request timed out");
                GateOutcome::TimedOut
            }
            () = cancel.cancelled() => {
                GateOutcome::Cancelled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn auto_grant_resolver_grants_immediately() {
        let gate = ApprovalGate::new(Box::new(AutoGrantResolver));
        let outcome = gate
            .request_approval(
                ApprovalRequest {
                    tenant_id: TenantId::new("acme"),
                    server: "srv1".into(),
                    tool: "echo".into(),
                    args: serde_json::json!({}),
                },
                Duration::from_secs(1),
                &CancellationToken::new(),
            )
            .await;
        assert_eq!(outcome, GateOutcome::Granted);
    }

    struct NeverRespondsResolver;

    #[async_trait]
    impl ApprovalResolver for NeverRespondsResolver {
        async fn resolve(&self, _request: ApprovalRequest) -> ApprovalDecision {
            std::future::pending::<()>().await;
            unreachable!()
        }
    }

    #[tokio::test]
    async fn unanswered_request_times_out() {
        let gate = ApprovalGate::new(Box::new(NeverRespondsResolver));
        let outcome = gate
            .request_approval(
                ApprovalRequest {
                    tenant_id: TenantId::new("acme"),
                    server: "srv1".into(),
                    tool: "echo".into(),
                    args: serde_json::json!({}),
                },
                Duration::from_millis(10),
                &CancellationToken::new(),
            )
            .await;
        assert_eq!(outcome, GateOutcome::TimedOut);
    }

    #[tokio::test]
    async fn cancel_wins_over_a_pending_request() {
        let gate = ApprovalGate::new(Box::new(NeverRespondsResolver));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = gate
            .request_approval(
                ApprovalRequest {
                    tenant_id: TenantId::new("acme"),
                    server: "srv1".into(),
                    tool: "echo".into(),
                    args: serde_json::json!({}),
                },
                Duration::from_secs(5),
                &cancel,
            )
            .await;
        assert_eq!(outcome, GateOutcome::Cancelled);
    }
}
