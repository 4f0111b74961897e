//! Vendor adapters for the Switchboard gateway
//!
//! Each vendor (`OpenAI`, Azure `OpenAI`, Anthropic, Cohere, Gemini, Vertex AI,
//! Mistral, Hugging Face, Replicate, Voyage AI) is one adapter struct
//! exposing the capabilities it supports through [`Provider`]. Streaming
//! responses from every vendor are folded through one
//! [`stream::StreamAccumulator`], so the token policy lives in one place.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod call;
pub mod caller;
pub mod convert;
pub mod error;
pub mod ordering;
pub mod protocol;
pub mod provider;
pub mod registry;
pub mod stream;
mod transport;

pub use caller::{
    Completion, EmbeddingCaller, LargeLanguageCaller, Provider, ProviderCapabilities, RerankingCaller, StreamSink,
    StreamingCaller, VerificationStatus, Verifier,
};
pub use error::{CallError, CallResult, LlmError};
pub use registry::{ProviderRegistry, ProviderSettings};
pub use stream::{StreamAccumulator, StreamEvent};
