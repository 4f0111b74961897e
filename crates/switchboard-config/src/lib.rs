//! Configuration for the Switchboard gateway
//!
//! Loaded from a TOML file whose `{{ env.VAR }}` placeholders are expanded
//! before parsing.

#![allow(clippy::must_use_candidate)]

pub mod audit;
mod duration;
mod env;
pub mod gateway;
mod loader;
pub mod provider;
pub mod telemetry;

use indexmap::IndexMap;
use serde::Deserialize;

pub use audit::AuditConfig;
pub use gateway::GatewayConfig;
pub use provider::{CredentialConfig, PROVIDER_TAGS, PrincipalConfig, ProviderConfig};
pub use telemetry::{LogFormat, TelemetryConfig};

/// Top-level Switchboard configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    /// Per-vendor overrides keyed by provider tag
    #[serde(default)]
    pub providers: IndexMap<String, ProviderConfig>,
    /// Credentials the CLI can use, keyed by provider tag
    #[serde(default)]
    pub credentials: IndexMap<String, CredentialConfig>,
    /// Principal the CLI authenticates as; without one every call is rejected
    #[serde(default)]
    pub principal: Option<PrincipalConfig>,
}
