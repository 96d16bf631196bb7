//! The secret-tier `securityLevel` hook (§4.5, §9 open question 2).
//!
//! The Python reference this gateway is modeled on leaves its equivalent
//! check (`_validate_secret_access`) as a stub that always returns `True`.
//! This implementation does not inherit that permissiveness: connecting to a
//! `secret`-tier server fails closed unless a [`SecretAccessValidator`] is
//! explicitly configured.

use async_trait::async_trait;

use mcp_gateway_core::TenantId;

/// Pluggable hook consulted by `validateServerAccess` whenever a server's
/// policy is tagged `SecurityLevel::Secret`.
#[async_trait]
pub trait SecretAccessValidator: Send + Sync {
    async fn validate(&self, tenant: &TenantId, server: &str) -> bool;
}

/// The default validator: denies every secret-tier access. A deployment that
/// actually wants to grant secret-tier access must supply its own
/// `SecretAccessValidator` — there is no implicit "allow" fallback.
#[derive(Debug, Default)]
pub struct AlwaysDenySecretValidator;

#[async_trait]
impl SecretAccessValidator for AlwaysDenySecretValidator {
    async fn validate(&self, _tenant: &TenantId, _server: &str) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_validator_denies_everything() {
        let validator = AlwaysDenySecretValidator;
        assert!(!validator.validate(&TenantId::new("acme"), "srv1").await);
    }
}
