//! Gateway orchestrator for the Switchboard LLM gateway
//!
//! Takes canonical chat, embedding, reranking and verification requests
//! from a transport, authenticates the caller, wires audit hooks and hands
//! each request to the vendor adapter named by its provider tag.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod auth;
pub mod envelope;
mod error;
pub mod gateway;
pub mod id;
pub mod request;

pub use auth::{ApiKeyAuthenticator, Authenticator, Principal, StaticAuthenticator};
pub use envelope::{Envelope, ErrorBody};
pub use error::{GatewayError, INTERNAL_MESSAGE, UNAUTHENTICATED_MESSAGE};
pub use gateway::{Gateway, GatewayBuilder, ResponseSink};
pub use id::RequestIdGenerator;
pub use request::{ChatRequest, EmbeddingRequest, RerankingRequest, VerifyCredentialRequest};
