use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Texts keyed by the caller's index
///
/// Used for embedding inputs and reranking documents. Iteration is in
/// ascending index order, which is the order texts are sent to the vendor.
pub type IndexedContent = BTreeMap<u32, String>;

/// One embedding vector in the caller's index space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    /// Index of the input text this vector belongs to
    pub index: u32,
    pub embedding: Vec<f64>,
}

/// Relevance of one document to a query, in the caller's index space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reranking {
    /// Index of the input document
    pub index: u32,
    pub relevance_score: f64,
    /// The document text
    pub content: String,
}
