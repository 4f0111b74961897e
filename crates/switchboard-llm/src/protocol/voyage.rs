//! Voyage AI embeddings and rerank API wire format types

use serde::{Deserialize, Serialize};

/// Voyage embeddings request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoyageEmbeddingRequest {
    /// Texts to embed
    pub input: Vec<String>,
    /// Model identifier
    pub model: String,
    /// "query" or "document"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    /// Output dimensionality
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dimension: Option<u32>,
}

/// Voyage embeddings response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoyageEmbeddingResponse {
    /// One entry per input
    pub data: Vec<VoyageEmbeddingData>,
    /// Token usage
    #[serde(default)]
    pub usage: Option<VoyageUsage>,
}

/// One embedding vector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoyageEmbeddingData {
    /// Position of the input in the request list
    pub index: usize,
    /// Vector
    pub embedding: Vec<f64>,
}

/// Voyage rerank request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoyageRerankRequest {
    /// Search query
    pub query: String,
    /// Documents to rank
    pub documents: Vec<String>,
    /// Model identifier
    pub model: String,
    /// Number of results to return
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
}

/// Voyage rerank response, ordered by relevance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoyageRerankResponse {
    /// Ranked results
    pub data: Vec<VoyageRerankResult>,
    /// Token usage
    #[serde(default)]
    pub usage: Option<VoyageUsage>,
}

/// One ranked document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoyageRerankResult {
    /// Position of the document in the request list
    pub index: usize,
    /// Relevance to the query
    pub relevance_score: f64,
}

/// Token usage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoyageUsage {
    /// Tokens processed
    #[serde(default)]
    pub total_tokens: Option<u64>,
}
