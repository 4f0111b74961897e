//! Canonical requests delivered by the transport

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use switchboard_core::{Credential, IndexedContent, Message, ModelParameters, ToolDefinition};

/// Additional-data keys stamped by the gateway
pub mod additional {
    pub const PROVIDER_NAME: &str = "provider_name";
    pub const MODEL_NAME: &str = "model_name";
    pub const MODEL_ID: &str = "model_id";
    pub const SOURCE: &str = "source";
    pub const ENVIRONMENT: &str = "env";
    pub const REGION: &str = "region";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub credential: Credential,
    pub conversations: Vec<Message>,
    #[serde(default)]
    pub model_parameters: ModelParameters,
    #[serde(default)]
    pub tool_definitions: Vec<ToolDefinition>,
    /// Free-form metadata, audited with the call
    #[serde(default)]
    pub additional_data: IndexMap<String, String>,
}

impl ChatRequest {
    pub fn new(credential: Credential, conversations: Vec<Message>) -> Self {
        Self {
            credential,
            conversations,
            model_parameters: ModelParameters::new(),
            tool_definitions: Vec::new(),
            additional_data: IndexMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    pub credential: Credential,
    /// Texts keyed by the caller's index
    pub content: IndexedContent,
    #[serde(default)]
    pub model_parameters: ModelParameters,
    #[serde(default)]
    pub additional_data: IndexMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankingRequest {
    pub credential: Credential,
    pub query: String,
    /// Documents keyed by the caller's index
    pub content: IndexedContent,
    #[serde(default)]
    pub model_parameters: ModelParameters,
    #[serde(default)]
    pub additional_data: IndexMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyCredentialRequest {
    pub credential: Credential,
    #[serde(default)]
    pub model_parameters: ModelParameters,
}
