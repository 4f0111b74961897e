//! Hugging Face inference wire format types
//!
//! Chat goes through the OpenAI-compatible router and uses
//! [`super::openai`]; only feature extraction has its own shape.

use serde::{Deserialize, Serialize};

/// Feature-extraction request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureExtractionRequest {
    /// Texts to embed
    pub inputs: Vec<String>,
    /// Whether to L2-normalize the vectors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalize: Option<bool>,
    /// Whether to truncate inputs to the model's maximum length
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncate: Option<bool>,
}

/// Feature-extraction response: one vector per input, in request order
pub type FeatureExtractionResponse = Vec<Vec<f64>>;
