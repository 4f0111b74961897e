use std::time::Duration;

use indexmap::IndexMap;
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Provider tags the gateway ships adapters for
pub const PROVIDER_TAGS: &[&str] = &[
    "anthropic",
    "azure",
    "cohere",
    "gemini",
    "google",
    "huggingface",
    "mistral",
    "openai",
    "replicate",
    "vertexai",
    "voyageai",
];

/// Per-vendor settings, keyed by provider tag
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Base URL override; a credential's own `base_url` wins
    #[serde(default)]
    pub base_url: Option<Url>,
    /// Replaces the gateway request timeout for this vendor
    #[serde(default, deserialize_with = "crate::duration::deserialize_option")]
    pub timeout: Option<Duration>,
}

/// A vendor credential available to the CLI, keyed by provider tag
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialConfig {
    /// Vault id, used in audit object keys
    pub id: u64,
    /// Credential fields (`key`, `endpoint`, `project_id`, ...)
    #[serde(default)]
    pub value: IndexMap<String, SecretString>,
}

/// Principal the CLI acts as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrincipalConfig {
    pub organization_id: u64,
    #[serde(default)]
    pub project_id: Option<u64>,
}
