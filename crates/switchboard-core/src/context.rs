use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Runtime context for one inbound request
///
/// Carries the caller's cancellation signal and the client metadata the
/// transport extracted from headers.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Cancelled when the client goes away
    pub cancellation: CancellationToken,
    /// Where the request came from
    pub client: ClientSource,
    /// Transport metadata (headers), lower-cased keys
    pub metadata: IndexMap<String, String>,
}

impl RequestContext {
    /// Context for embedded (non-transport) use with no client metadata
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_client(mut self, client: ClientSource) -> Self {
        self.client = client;
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// Client metadata stamped onto every request's additional data
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSource {
    /// Calling surface (sdk, console, cli, ...)
    #[serde(default)]
    pub source: String,
    /// Deployment environment of the caller
    #[serde(default)]
    pub environment: String,
    /// Region the request entered through
    #[serde(default)]
    pub region: String,
}
