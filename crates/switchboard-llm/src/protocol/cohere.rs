//! Cohere v2 chat, embed and rerank API wire format types

use serde::{Deserialize, Serialize};

// -- Chat request types --

/// Cohere chat request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CohereChatRequest {
    /// Model identifier
    pub model: String,
    /// Conversation messages
    pub messages: Vec<CohereMessage>,
    /// Tool definitions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<CohereTool>>,
    /// Whether to stream the response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p: Option<f64>,
    /// Top-k sampling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<u32>,
    /// Frequency penalty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    /// Presence penalty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    /// Stop sequences
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    /// Random seed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    /// Structured output configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<CohereResponseFormat>,
    /// "REQUIRED" or "NONE"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
}

/// Cohere chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohereMessage {
    /// "system", "user", "assistant" or "tool"
    pub role: String,
    /// Text content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tool calls made by the assistant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<CohereToolCall>>,
    /// Tool call this message answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Cohere tool definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohereTool {
    /// Always "function"
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function specification
    pub function: CohereFunction,
}

/// Cohere function specification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohereFunction {
    /// Function name
    pub name: String,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for parameters
    pub parameters: serde_json::Value,
}

/// Cohere tool call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohereToolCall {
    /// Tool call identifier
    #[serde(default)]
    pub id: String,
    /// Always "function"
    #[serde(rename = "type", default)]
    pub tool_type: String,
    /// Function call details
    pub function: CohereFunctionCall,
}

/// Function call details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohereFunctionCall {
    /// Function name
    #[serde(default)]
    pub name: String,
    /// JSON-encoded arguments
    #[serde(default)]
    pub arguments: String,
}

/// Structured output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohereResponseFormat {
    /// "text" or "json_object"
    #[serde(rename = "type")]
    pub format_type: String,
    /// Optional schema for `json_object`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_schema: Option<serde_json::Value>,
}

// -- Chat response types --

/// Cohere chat response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohereChatResponse {
    /// Response identifier
    #[serde(default)]
    pub id: String,
    /// "COMPLETE", "MAX_TOKENS", "STOP_SEQUENCE", "TOOL_CALL" or "ERROR"
    #[serde(default)]
    pub finish_reason: Option<String>,
    /// Generated message
    #[serde(default)]
    pub message: CohereResponseMessage,
    /// Usage accounting
    #[serde(default)]
    pub usage: Option<CohereUsage>,
}

/// Generated message
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CohereResponseMessage {
    /// Content blocks
    #[serde(default)]
    pub content: Vec<CohereContentBlock>,
    /// Tool calls
    #[serde(default)]
    pub tool_calls: Vec<CohereToolCall>,
}

/// Content block in a response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohereContentBlock {
    /// Block type ("text" or "thinking")
    #[serde(rename = "type", default)]
    pub block_type: String,
    /// Text
    #[serde(default)]
    pub text: Option<String>,
}

/// Usage accounting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CohereUsage {
    /// Units billed
    #[serde(default)]
    pub billed_units: Option<CohereBilledUnits>,
    /// Tokens processed
    #[serde(default)]
    pub tokens: Option<CohereTokens>,
}

/// Units billed for a call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CohereBilledUnits {
    /// Billed input tokens
    #[serde(default)]
    pub input_tokens: Option<f64>,
    /// Billed output tokens
    #[serde(default)]
    pub output_tokens: Option<f64>,
    /// Billed search units (rerank)
    #[serde(default)]
    pub search_units: Option<f64>,
}

/// Tokens processed by a call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CohereTokens {
    /// Input tokens
    #[serde(default)]
    pub input_tokens: Option<f64>,
    /// Output tokens
    #[serde(default)]
    pub output_tokens: Option<f64>,
}

// -- Streaming types --

/// Cohere stream event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CohereStreamEvent {
    /// Stream started
    MessageStart,
    /// Text block started
    ContentStart {
        /// Block index
        #[serde(default)]
        index: u32,
    },
    /// Incremental text
    ContentDelta {
        /// Block index
        #[serde(default)]
        index: u32,
        /// Delta payload
        delta: CohereStreamDelta,
    },
    /// Text block finished
    ContentEnd {
        /// Block index
        #[serde(default)]
        index: u32,
    },
    /// Incremental tool plan text (not surfaced)
    ToolPlanDelta,
    /// Tool call started
    ToolCallStart {
        /// Tool call index
        #[serde(default)]
        index: u32,
        /// Delta payload with id and name
        delta: CohereStreamDelta,
    },
    /// Incremental tool arguments
    ToolCallDelta {
        /// Tool call index
        #[serde(default)]
        index: u32,
        /// Delta payload with an arguments fragment
        delta: CohereStreamDelta,
    },
    /// Tool call finished
    ToolCallEnd {
        /// Tool call index
        #[serde(default)]
        index: u32,
    },
    /// Stream finished with usage
    MessageEnd {
        /// Finish reason and usage
        #[serde(default)]
        delta: CohereStreamDelta,
    },
    /// Citations and other event types
    #[serde(other)]
    Other,
}

/// Delta payload shared by stream events
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CohereStreamDelta {
    /// Message delta
    #[serde(default)]
    pub message: Option<CohereDeltaMessage>,
    /// Finish reason (`message-end` only)
    #[serde(default)]
    pub finish_reason: Option<String>,
    /// Usage (`message-end` only)
    #[serde(default)]
    pub usage: Option<CohereUsage>,
}

/// Message portion of a stream delta
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CohereDeltaMessage {
    /// Text content delta
    #[serde(default)]
    pub content: Option<CohereDeltaContent>,
    /// Tool call delta
    #[serde(default)]
    pub tool_calls: Option<CohereDeltaToolCall>,
}

/// Text content delta
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CohereDeltaContent {
    /// Text fragment
    #[serde(default)]
    pub text: Option<String>,
}

/// Tool call delta
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CohereDeltaToolCall {
    /// Tool call identifier (start only)
    #[serde(default)]
    pub id: Option<String>,
    /// Function details
    #[serde(default)]
    pub function: Option<CohereDeltaFunction>,
}

/// Function delta
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CohereDeltaFunction {
    /// Function name (start only)
    #[serde(default)]
    pub name: Option<String>,
    /// Arguments fragment
    #[serde(default)]
    pub arguments: Option<String>,
}

// -- Embed types --

/// Cohere embed request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohereEmbedRequest {
    /// Model identifier
    pub model: String,
    /// Texts to embed
    pub texts: Vec<String>,
    /// "search_document", "search_query", "classification" or "clustering"
    pub input_type: String,
    /// Requested vector encodings
    pub embedding_types: Vec<String>,
}

/// Cohere embed response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohereEmbedResponse {
    /// Vectors by encoding, in request order
    pub embeddings: CohereEmbeddings,
    /// Billing metadata
    #[serde(default)]
    pub meta: Option<CohereMeta>,
}

/// Vectors by encoding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohereEmbeddings {
    /// Float vectors
    #[serde(default)]
    pub float: Vec<Vec<f64>>,
}

/// Billing metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CohereMeta {
    /// Units billed
    #[serde(default)]
    pub billed_units: Option<CohereBilledUnits>,
}

// -- Rerank types --

/// Cohere rerank request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohereRerankRequest {
    /// Model identifier
    pub model: String,
    /// Search query
    pub query: String,
    /// Documents to rank
    pub documents: Vec<String>,
    /// Number of results to return
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_n: Option<u32>,
}

/// Cohere rerank response, ordered by relevance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohereRerankResponse {
    /// Ranked results
    pub results: Vec<CohereRerankResult>,
    /// Billing metadata
    #[serde(default)]
    pub meta: Option<CohereMeta>,
}

/// One ranked document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohereRerankResult {
    /// Position of the document in the request list
    pub index: usize,
    /// Relevance to the query
    pub relevance_score: f64,
}

// -- Credential check --

/// `check-api-key` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohereCheckApiKeyResponse {
    /// Whether the key is valid
    #[serde(default)]
    pub valid: bool,
}
