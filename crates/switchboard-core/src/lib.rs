//! Shared types for the Switchboard gateway
//!
//! The canonical message model, model parameters, credentials, metrics and
//! per-request options used by every vendor adapter.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod context;
pub mod credential;
pub mod embedding;
pub mod error;
pub mod message;
pub mod metrics;
pub mod options;
pub mod params;
pub mod tool;

pub use context::{ClientSource, RequestContext};
pub use credential::{Credential, CredentialError, ResolvedCredential};
pub use embedding::{Embedding, IndexedContent, Reranking};
pub use error::HttpError;
pub use message::{
    AssistantMessage, FunctionCall, Message, Role, SystemMessage, ToolCall, ToolMessage, ToolResult, UserMessage,
};
pub use metrics::{Metric, MetricBuilder, Status, TokenUsage, UsageMetrics};
pub use options::{ChatCompletionOptions, EmbeddingOptions, Hooks, PostHook, PreHook, RerankingOptions};
pub use params::ModelParameters;
pub use tool::{FunctionDefinition, ToolDefinition};
