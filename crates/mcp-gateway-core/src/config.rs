//! Layered gateway configuration: defaults, an optional YAML file, then
//! environment overrides prefixed `MCP_GATEWAY_` — the same three-tier shape
//! the teacher workspace's `config` dependency is already pulled in for.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, GatewayResult};

/// Top-level gateway configuration, deserialized from YAML and/or environment
/// variables via the `config` crate's layered `Config` builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Path the Audit Sink appends its JSON-lines log to.
    pub audit_log_path: String,
    /// Size of the Audit Sink's internal channel before backpressure kicks in
    /// (§4.8 — fail-closed once exceeded, never dropped silently).
    pub audit_channel_capacity: usize,
    /// Interval between health-probe `ping`s sent by the Connection Supervisor.
    #[serde(with = "humantime_secs")]
    pub health_probe_interval: Duration,
    /// Deadline for a single health-probe `ping` before the Connection is
    /// marked `Degraded`.
    #[serde(with = "humantime_secs")]
    pub health_probe_deadline: Duration,
    /// Base delay for the Supervisor's exponential reconnect backoff.
    #[serde(with = "humantime_secs")]
    pub reconnect_base_delay: Duration,
    /// Upper bound on a single reconnect backoff delay.
    #[serde(with = "humantime_secs")]
    pub reconnect_max_delay: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            audit_log_path: "gateway-audit.jsonl".to_string(),
            audit_channel_capacity: 1024,
            health_probe_interval: Duration::from_secs(30),
            health_probe_deadline: Duration::from_secs(5),
            reconnect_base_delay: Duration::from_millis(250),
            reconnect_max_delay: Duration::from_secs(30),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from defaults, then merge in an optional YAML file,
    /// then environment overrides prefixed `MCP_GATEWAY_` (e.g.
    /// `MCP_GATEWAY_AUDIT_LOG_PATH`).
    pub fn load(yaml_path: Option<&Path>) -> GatewayResult<Self> {
        let defaults = Self::default();
        let mut builder = config::Config::builder().add_source(
            config::Config::try_from(&defaults)
                .map_err(|e| GatewayError::Internal(format!("default config: {e}")))?,
        );

        if let Some(path) = yaml_path {
            builder = builder.add_source(config::File::from(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("MCP_GATEWAY")
                .separator("_")
                .try_parsing(true),
        );

        builder
            .build()
            .and_then(config::Config::try_deserialize)
            .map_err(|e| GatewayError::Internal(format!("config load: {e}")))
    }
}

/// `serde(with = ...)` helper: (de)serialize a [`Duration`] as whole seconds.
mod humantime_secs {
    use super::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_a_file() {
        let cfg = GatewayConfig::load(None).expect("defaults must always parse");
        assert_eq!(cfg.audit_channel_capacity, 1024);
    }
}
