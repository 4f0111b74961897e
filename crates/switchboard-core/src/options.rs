//! Per-request call options and audit hooks

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::{Metric, ModelParameters, ToolDefinition};

/// Receives the raw vendor request body when a call starts
pub type PreHook = Arc<dyn Fn(Value) + Send + Sync>;

/// Receives the raw vendor response body and final metrics when a call ends
pub type PostHook = Arc<dyn Fn(Value, Vec<Metric>) + Send + Sync>;

/// Pre/post call hooks bound to one request
#[derive(Clone)]
pub struct Hooks {
    pre: PreHook,
    post: PostHook,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks").finish_non_exhaustive()
    }
}

impl Default for Hooks {
    fn default() -> Self {
        Self::noop()
    }
}

impl Hooks {
    pub fn new(pre: PreHook, post: PostHook) -> Self {
        Self { pre, post }
    }

    /// Hooks that do nothing
    pub fn noop() -> Self {
        Self {
            pre: Arc::new(|_: Value| {}),
            post: Arc::new(|_: Value, _: Vec<Metric>| {}),
        }
    }

    /// Fire the pre-call hook with a vendor request body
    ///
    /// A body that cannot be encoded is reported as `{}`.
    pub fn pre<T: Serialize + ?Sized>(&self, body: &T) {
        (self.pre)(encode(body));
    }

    /// Fire the post-call hook; a missing body is reported as `{}`
    pub fn post<T: Serialize + ?Sized>(&self, body: Option<&T>, metrics: Vec<Metric>) {
        let value = body.map_or_else(empty_object, encode);
        (self.post)(value, metrics);
    }
}

fn encode<T: Serialize + ?Sized>(body: &T) -> Value {
    serde_json::to_value(body).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to encode hook payload");
        empty_object()
    })
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Options for a chat completion call
///
/// Built once per inbound request and consumed by exactly one adapter call.
#[derive(Debug, Clone, Default)]
pub struct ChatCompletionOptions {
    /// Process-unique request id
    pub request_id: u64,
    pub model_parameters: ModelParameters,
    /// Tools offered to the model, in order
    pub tool_definitions: Vec<ToolDefinition>,
    pub hooks: Hooks,
}

/// Options for an embedding call
#[derive(Debug, Clone, Default)]
pub struct EmbeddingOptions {
    pub request_id: u64,
    pub model_parameters: ModelParameters,
    pub hooks: Hooks,
}

/// Options for a reranking call
#[derive(Debug, Clone, Default)]
pub struct RerankingOptions {
    pub request_id: u64,
    pub model_parameters: ModelParameters,
    pub hooks: Hooks,
}
