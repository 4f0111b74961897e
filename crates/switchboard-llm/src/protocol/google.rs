//! Google Generative Language and Vertex AI wire format types
//!
//! Gemini (API key) and Vertex AI (project/region, OAuth) share the
//! `generateContent` payloads; only the URL and authentication differ.

use serde::{Deserialize, Serialize};

// -- Request types --

/// `generateContent` request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleRequest {
    /// Conversation contents
    pub contents: Vec<GoogleContent>,
    /// System instruction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GoogleContent>,
    /// Generation configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GoogleGenerationConfig>,
    /// Tool definitions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<GoogleTool>>,
    /// Tool configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_config: Option<GoogleToolConfig>,
}

/// Content object containing role and parts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoogleContent {
    /// Role ("user" or "model")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Content parts
    #[serde(default)]
    pub parts: Vec<GooglePart>,
}

/// Individual part within a content object
///
/// Exactly one payload field is set per part.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GooglePart {
    /// Text content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Function call from the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<GoogleFunctionCall>,
    /// Function response from the user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<GoogleFunctionResponse>,
    /// Whether this text part is model thinking
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
}

impl GooglePart {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn function_call(call: GoogleFunctionCall) -> Self {
        Self {
            function_call: Some(call),
            ..Self::default()
        }
    }

    pub fn function_response(response: GoogleFunctionResponse) -> Self {
        Self {
            function_response: Some(response),
            ..Self::default()
        }
    }
}

/// Function call from the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoogleFunctionCall {
    /// Call identifier (newer models only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Function name
    pub name: String,
    /// Function arguments as JSON
    #[serde(default)]
    pub args: serde_json::Value,
}

/// Function response from the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoogleFunctionResponse {
    /// Call identifier this response answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Function name
    pub name: String,
    /// Response content as JSON
    pub response: serde_json::Value,
}

/// Generation configuration parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleGenerationConfig {
    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Top-k sampling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    /// Maximum output tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    /// Stop sequences
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    /// Frequency penalty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    /// Presence penalty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    /// Random seed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    /// Output MIME type (`application/json`, `text/x.enum`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    /// Output schema for structured responses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<serde_json::Value>,
    /// Thinking configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_config: Option<GoogleThinkingConfig>,
}

/// Thinking configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleThinkingConfig {
    /// Return thought summaries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_thoughts: Option<bool>,
    /// Token budget for thinking
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_budget: Option<i64>,
}

/// Tool definition wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleTool {
    /// Function declarations
    pub function_declarations: Vec<GoogleFunctionDeclaration>,
}

/// Function declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleFunctionDeclaration {
    /// Function name
    pub name: String,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for parameters
    pub parameters: serde_json::Value,
}

/// Tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleToolConfig {
    /// Function calling config
    pub function_calling_config: GoogleFunctionCallingConfig,
}

/// Function calling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleFunctionCallingConfig {
    /// Mode: "AUTO", "ANY", "NONE"
    pub mode: String,
}

// -- Response types --

/// `generateContent` response; each streamed SSE chunk has the same shape
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleResponse {
    /// Generated candidates
    #[serde(default)]
    pub candidates: Vec<GoogleCandidate>,
    /// Token usage metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<GoogleUsageMetadata>,
}

/// Generated candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleCandidate {
    /// Generated content
    #[serde(default)]
    pub content: GoogleContent,
    /// Finish reason
    #[serde(default)]
    pub finish_reason: Option<String>,
    /// Candidate index
    #[serde(default)]
    pub index: Option<u32>,
}

/// Token usage metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleUsageMetadata {
    /// Prompt token count
    #[serde(default)]
    pub prompt_token_count: Option<u64>,
    /// Candidates token count
    #[serde(default)]
    pub candidates_token_count: Option<u64>,
    /// Total token count
    #[serde(default)]
    pub total_token_count: Option<u64>,
    /// Tokens in the cached content
    #[serde(default)]
    pub cached_content_token_count: Option<u64>,
    /// Tokens in tool-use prompts
    #[serde(default)]
    pub tool_use_prompt_token_count: Option<u64>,
    /// Tokens spent on thinking
    #[serde(default)]
    pub thoughts_token_count: Option<u64>,
}

// -- Embedding types (Gemini) --

/// `batchEmbedContents` request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleBatchEmbedRequest {
    /// One request per input text
    pub requests: Vec<GoogleEmbedContentRequest>,
}

/// Single embedding request within a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleEmbedContentRequest {
    /// Fully qualified model (`models/{name}`)
    pub model: String,
    /// Text to embed
    pub content: GoogleContent,
    /// Intended use of the embedding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,
    /// Truncated output dimensionality
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dimensionality: Option<u32>,
}

/// `batchEmbedContents` response, in request order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleBatchEmbedResponse {
    /// Embeddings
    #[serde(default)]
    pub embeddings: Vec<GoogleEmbeddingValues>,
}

/// Embedding vector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleEmbeddingValues {
    /// Vector
    #[serde(default)]
    pub values: Vec<f64>,
}

// -- Embedding types (Vertex AI) --

/// Vertex `predict` request for text embedding models
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VertexPredictRequest {
    /// One instance per input text
    pub instances: Vec<VertexEmbeddingInstance>,
    /// Model parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<VertexEmbeddingParameters>,
}

/// Embedding instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VertexEmbeddingInstance {
    /// Text to embed
    pub content: String,
    /// Intended use of the embedding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,
}

/// Embedding parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VertexEmbeddingParameters {
    /// Truncated output dimensionality
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dimensionality: Option<u32>,
}

/// Vertex `predict` response, in request order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VertexPredictResponse {
    /// Predictions
    #[serde(default)]
    pub predictions: Vec<VertexEmbeddingPrediction>,
}

/// One prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VertexEmbeddingPrediction {
    /// Embedding payload
    pub embeddings: VertexEmbedding,
}

/// Embedding payload with statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VertexEmbedding {
    /// Vector
    #[serde(default)]
    pub values: Vec<f64>,
    /// Token statistics
    #[serde(default)]
    pub statistics: Option<VertexEmbeddingStatistics>,
}

/// Token statistics for one embedded text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VertexEmbeddingStatistics {
    /// Tokens in the input
    #[serde(default)]
    pub token_count: Option<f64>,
}
