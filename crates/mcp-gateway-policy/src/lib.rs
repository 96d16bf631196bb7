//! Policy Engine (C5), Rate Limiter (C6), and Approval Gate (C7): the
//! per-tenant allow/deny/rate/approval evaluation a tool call or resource
//! read traverses before it ever reaches the wire (§4.5–§4.7).

pub mod approval;
pub mod policy;
mod proptests;
pub mod rate_limit;
pub mod secret;

pub use approval::{ApprovalDecision, ApprovalGate, ApprovalRequest, ApprovalResolver, AutoGrantResolver};
pub use policy::{PolicyEngine, SecurityLevel, SecurityPolicy};
pub use rate_limit::RateLimiterBucket;
pub use secret::{AlwaysDenySecretValidator, SecretAccessValidator};

use mcp_gateway_core::DenialReason;

/// Either side returned by a pure policy evaluation (§4.5).
pub type PolicyDecision = Result<(), DenialReason>;
