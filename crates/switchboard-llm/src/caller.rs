//! Capability traits implemented by vendor adapters

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use switchboard_core::{
    ChatCompletionOptions, Embedding, EmbeddingOptions, IndexedContent, Message, Metric, ModelParameters,
    RequestContext, Reranking, RerankingOptions,
};

use crate::error::{CallResult, LlmError};

/// Successful vendor call output with its metrics
#[derive(Debug, Clone)]
pub struct Completion<T> {
    pub data: T,
    pub metrics: Vec<Metric>,
}

/// Unary chat completion
#[async_trait]
pub trait LargeLanguageCaller: Send + Sync {
    /// Send the conversation and parse the vendor's answer into an
    /// assistant message
    async fn chat_completion(&self, history: &[Message], options: &ChatCompletionOptions) -> CallResult<Message>;
}

/// Streaming chat completion
///
/// Tokens are delivered through the sink on the same task that reads the
/// vendor stream, so a slow sink slows the vendor read.
#[async_trait]
pub trait StreamingCaller: Send + Sync {
    async fn stream_chat_completion(
        &self,
        history: &[Message],
        options: &ChatCompletionOptions,
        context: &RequestContext,
        sink: &mut dyn StreamSink,
    ) -> Result<(), LlmError>;
}

/// Embedding generation
///
/// Output holds exactly one embedding per input index, sorted by index.
#[async_trait]
pub trait EmbeddingCaller: Send + Sync {
    async fn embedding(&self, content: &IndexedContent, options: &EmbeddingOptions) -> CallResult<Vec<Embedding>>;
}

/// Document reranking
///
/// Output indices refer to the caller's document indices.
#[async_trait]
pub trait RerankingCaller: Send + Sync {
    async fn reranking(
        &self,
        query: &str,
        documents: &IndexedContent,
        options: &RerankingOptions,
    ) -> CallResult<Vec<Reranking>>;
}

/// Outcome of a credential check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Valid,
    /// The vendor rejected the credential (401 or 403)
    Invalid,
}

/// Cheap credential check against the vendor
#[async_trait]
pub trait Verifier: Send + Sync {
    /// Anything other than a definitive 401/403 rejection is returned as
    /// an error rather than [`VerificationStatus::Invalid`]
    async fn verify_credential(&self, parameters: &ModelParameters) -> Result<VerificationStatus, LlmError>;
}

/// Receives the output of a streaming call
#[async_trait]
pub trait StreamSink: Send {
    /// One text delta wrapped as an assistant message
    async fn on_token(&mut self, token: Message) -> anyhow::Result<()>;

    /// The complete message; called exactly once for a successful stream
    async fn on_complete(&mut self, message: Message, metrics: Vec<Metric>) -> anyhow::Result<()>;

    /// The vendor stream failed
    async fn on_error(&mut self, error: &LlmError);
}

/// Capabilities advertised by an adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct ProviderCapabilities {
    pub chat: bool,
    pub streaming: bool,
    pub embedding: bool,
    pub reranking: bool,
}

/// One vendor adapter
///
/// Capabilities are probed rather than assumed: an adapter returns `None`
/// for the contracts its vendor cannot serve.
pub trait Provider: Send + Sync {
    /// Provider tag (`openai`, `anthropic`, ...)
    fn name(&self) -> &str;

    fn chat_caller(&self) -> Option<&dyn LargeLanguageCaller> {
        None
    }

    fn streaming_caller(&self) -> Option<&dyn StreamingCaller> {
        None
    }

    fn embedding_caller(&self) -> Option<&dyn EmbeddingCaller> {
        None
    }

    fn reranking_caller(&self) -> Option<&dyn RerankingCaller> {
        None
    }

    fn verifier(&self) -> &dyn Verifier;

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            chat: self.chat_caller().is_some(),
            streaming: self.streaming_caller().is_some(),
            embedding: self.embedding_caller().is_some(),
            reranking: self.reranking_caller().is_some(),
        }
    }
}
