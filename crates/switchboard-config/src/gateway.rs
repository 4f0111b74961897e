use std::time::Duration;

use serde::Deserialize;

/// Gateway-wide settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Bound on a unary vendor call or the opening of a stream
    #[serde(default = "default_request_timeout", deserialize_with = "crate::duration::deserialize")]
    pub request_timeout: Duration,
    /// Client source stamped into every request's additional data
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub region: String,
    /// Node id mixed into request ids
    #[serde(default)]
    pub node: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            source: String::new(),
            environment: String::new(),
            region: String::new(),
            node: 0,
        }
    }
}

const fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}
