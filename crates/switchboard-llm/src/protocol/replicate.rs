//! Replicate predictions API wire format types

use serde::{Deserialize, Serialize};

/// Prediction request
///
/// Official models are addressed by path and need no version; community
/// models are pinned with `version`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicatePredictionRequest {
    /// Model version hash (community models only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Model input
    pub input: ReplicateInput,
}

/// Input for language models
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplicateInput {
    /// Prompt text
    pub prompt: String,
    /// System prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Top-k sampling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    /// Comma-separated stop sequences
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<String>,
    /// Random seed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
}

/// Prediction state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicatePrediction {
    /// Prediction identifier
    #[serde(default)]
    pub id: String,
    /// "starting", "processing", "succeeded", "failed" or "canceled"
    #[serde(default)]
    pub status: String,
    /// Output: a list of text chunks or a single string
    #[serde(default)]
    pub output: Option<ReplicateOutput>,
    /// Failure description
    #[serde(default)]
    pub error: Option<serde_json::Value>,
    /// Links for polling
    #[serde(default)]
    pub urls: Option<ReplicateUrls>,
    /// Token accounting
    #[serde(default)]
    pub metrics: Option<ReplicateMetrics>,
}

/// Model output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplicateOutput {
    /// Streamed chunks, joined without separator
    Chunks(Vec<String>),
    /// Single string
    Text(String),
}

/// Links for a prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicateUrls {
    /// Poll URL
    #[serde(default)]
    pub get: Option<String>,
}

/// Token accounting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplicateMetrics {
    /// Input tokens
    #[serde(default)]
    pub input_token_count: Option<u64>,
    /// Output tokens
    #[serde(default)]
    pub output_token_count: Option<u64>,
}
