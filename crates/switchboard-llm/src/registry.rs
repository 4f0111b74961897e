//! Provider tag to adapter constructor lookup
//!
//! The registry is an explicit value handed to the orchestrator. It is
//! filled once at startup and only read afterwards.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use switchboard_core::Credential;
use url::Url;

use crate::caller::Provider;
use crate::error::LlmError;
use crate::provider::{
    anthropic::AnthropicProvider, azure::AzureOpenAiProvider, cohere::CohereProvider, gemini::GeminiProvider,
    huggingface::HuggingFaceProvider, mistral::MistralProvider, openai::OpenAiProvider,
    replicate::ReplicateProvider, vertex::VertexProvider, voyage::VoyageProvider,
};

/// Bound on a unary vendor call or the opening of a stream
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Per-vendor settings that are not part of the credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    /// Base URL override; a credential's own `base_url` takes precedence
    pub base_url: Option<Url>,
    pub timeout: Duration,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Builds an adapter named `tag` for one credential
pub type ProviderConstructor = fn(&str, &Credential, &ProviderSettings) -> Result<Arc<dyn Provider>, LlmError>;

/// Lookup table of adapter constructors keyed by provider tag
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    constructors: HashMap<String, ProviderConstructor>,
    settings: HashMap<String, ProviderSettings>,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tags: Vec<&String> = self.constructors.keys().collect();
        tags.sort();
        f.debug_struct("ProviderRegistry")
            .field("providers", &tags)
            .field("settings", &self.settings)
            .finish()
    }
}

/// Every built-in provider tag
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

fn boxed<P: Provider + 'static>(provider: Result<P, LlmError>) -> Result<Arc<dyn Provider>, LlmError> {
    provider.map(|p| Arc::new(p) as Arc<dyn Provider>)
}

impl ProviderRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in adapter
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("openai", |tag, c, s| boxed(OpenAiProvider::new(tag, c, s)));
        registry.register("azure", |tag, c, s| boxed(AzureOpenAiProvider::new(tag, c, s)));
        registry.register("anthropic", |tag, c, s| boxed(AnthropicProvider::new(tag, c, s)));
        registry.register("cohere", |tag, c, s| boxed(CohereProvider::new(tag, c, s)));
        registry.register("gemini", |tag, c, s| boxed(GeminiProvider::new(tag, c, s)));
        registry.register("google", |tag, c, s| boxed(GeminiProvider::new(tag, c, s)));
        registry.register("vertexai", |tag, c, s| boxed(VertexProvider::new(tag, c, s)));
        registry.register("mistral", |tag, c, s| boxed(MistralProvider::new(tag, c, s)));
        registry.register("huggingface", |tag, c, s| boxed(HuggingFaceProvider::new(tag, c, s)));
        registry.register("replicate", |tag, c, s| boxed(ReplicateProvider::new(tag, c, s)));
        registry.register("voyageai", |tag, c, s| boxed(VoyageProvider::new(tag, c, s)));
        registry
    }

    /// Add or replace the constructor for a tag
    pub fn register(&mut self, tag: impl Into<String>, constructor: ProviderConstructor) -> &mut Self {
        self.constructors.insert(tag.into(), constructor);
        self
    }

    /// Settings applied to every adapter built for `tag`
    pub fn configure(&mut self, tag: impl Into<String>, settings: ProviderSettings) -> &mut Self {
        self.settings.insert(tag.into(), settings);
        self
    }

    /// Timeout for tags without their own settings
    pub fn set_default_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.constructors.contains_key(tag)
    }

    pub fn settings(&self, tag: &str) -> ProviderSettings {
        self.settings.get(tag).cloned().unwrap_or_else(|| ProviderSettings {
            base_url: None,
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
        })
    }

    /// Build the adapter for `tag` bound to `credential`
    ///
    /// Only the credential's shape is checked here; the keys a call needs
    /// are pulled when the call is made.
    pub fn create(&self, tag: &str, credential: &Credential) -> Result<Arc<dyn Provider>, LlmError> {
        let constructor = self.constructors.get(tag).ok_or_else(|| LlmError::ProviderNotFound {
            provider: tag.to_owned(),
        })?;
        constructor(tag, credential, &self.settings(tag))
    }
}
