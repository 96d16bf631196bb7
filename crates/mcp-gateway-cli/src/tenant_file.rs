//! The tenant-policy YAML file's shape: one `SecurityPolicy` per server this
//! tenant is allowed to reach, hand-authored alongside the server catalog.

use serde::{Deserialize, Serialize};

use mcp_gateway_core::TenantId;
use mcp_gateway_policy::SecurityPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantPolicyFile {
    pub tenant_id: TenantId,
    pub policies: Vec<SecurityPolicy>,
}
