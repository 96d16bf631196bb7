//! Minimal YAML interfaces the excluded discovery/installation collaborator
//! would otherwise own (§5 non-goals: "no attempt to implement server
//! discovery or installation"). These structs exist only so
//! `mcp-gateway-cli`'s demo binary can read a hand-authored catalog file and
//! construct [`ServerConfig`]s from it — no catalog-parsing logic, network
//! fetch, or installation behavior lives here.

use serde::{Deserialize, Serialize};

use crate::model::ServerConfig;

/// A hand-authored stand-in for the source system's server-spec catalog and
/// installed-servers file: both are YAML documents whose interesting content,
/// once discovery/installation are out of scope, reduces to "here are some
/// already-concretized `ServerConfig`s".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCatalog {
    pub servers: Vec<ServerConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_a_minimal_catalog() {
        let yaml = r#"
servers:
  - name: "echo"
    tenantId: "acme"
    transport: "stdio"
    command: "echo-server"
    args: []
    requestTimeout: 30
    maxRetries: 3
"#;
        let catalog: ServerCatalog = serde_yaml::from_str(yaml).expect("valid catalog");
        assert_eq!(catalog.servers.len(), 1);
        assert_eq!(catalog.servers[0].name, "echo");
    }
}
