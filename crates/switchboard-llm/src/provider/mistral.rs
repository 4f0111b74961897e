//! Mistral adapter
//!
//! `OpenAI`-compatible chat and embeddings. Streaming is not offered.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use secrecy::ExposeSecret;
use switchboard_core::{
    ChatCompletionOptions, Credential, Embedding, EmbeddingOptions, IndexedContent, Message, ModelParameters,
    ResolvedCredential,
};
use url::Url;

use super::openai::{complete, embed};
use super::{endpoint, fields, model_name};
use crate::call::Call;
use crate::caller::{EmbeddingCaller, LargeLanguageCaller, Provider, VerificationStatus, Verifier};
use crate::convert::ensure_history;
use crate::convert::openai::{Flavor, build_embedding_request, build_request};
use crate::error::{CallResult, LlmError};
use crate::registry::ProviderSettings;
use crate::transport::verify;

/// Default Mistral API base URL
const DEFAULT_BASE_URL: &str = "https://api.mistral.ai/v1";

/// Mistral adapter
pub struct MistralProvider {
    name: String,
    client: Client,
    credential: ResolvedCredential,
    settings: ProviderSettings,
}

impl MistralProvider {
    pub fn new(name: &str, credential: &Credential, settings: &ProviderSettings) -> Result<Self, LlmError> {
        Ok(Self {
            name: name.to_owned(),
            client: Client::new(),
            credential: credential.resolve()?,
            settings: settings.clone(),
        })
    }

    fn base_url(&self) -> Result<Url, LlmError> {
        super::base_url(&self.credential, &self.settings, DEFAULT_BASE_URL)
    }

    fn post(&self, path: &str) -> Result<RequestBuilder, LlmError> {
        let key = self.credential.secret(fields::KEY)?;
        let url = endpoint(&self.base_url()?, path);
        Ok(self.client.post(url).bearer_auth(key.expose_secret()))
    }
}

#[async_trait]
impl LargeLanguageCaller for MistralProvider {
    async fn chat_completion(&self, history: &[Message], options: &ChatCompletionOptions) -> CallResult<Message> {
        let call = Call::start(&self.name, options.request_id, &options.hooks);
        let prepared = ensure_history(history)
            .and_then(|()| model_name(&options.model_parameters))
            .and_then(|model| {
                let builder = self.post("chat/completions")?;
                Ok((builder, build_request(model, history, options, Flavor::Compatible, false)))
            });
        let (builder, request) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => return Err(call.fail(e)),
        };
        complete(call, &self.name, builder, &request, self.settings.timeout).await
    }
}

#[async_trait]
impl EmbeddingCaller for MistralProvider {
    async fn embedding(&self, content: &IndexedContent, options: &EmbeddingOptions) -> CallResult<Vec<Embedding>> {
        let call = Call::start(&self.name, options.request_id, &options.hooks);
        let params = &options.model_parameters;
        let prepared = model_name(params).and_then(|model| {
            let builder = self.post("embeddings")?;
            Ok((builder, build_embedding_request(model, content, params, Flavor::Compatible)))
        });
        let (builder, request) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => return Err(call.fail(e)),
        };
        embed(call, &self.name, builder, &request, content, self.settings.timeout).await
    }
}

#[async_trait]
impl Verifier for MistralProvider {
    async fn verify_credential(&self, _parameters: &ModelParameters) -> Result<VerificationStatus, LlmError> {
        let key = self.credential.secret(fields::KEY)?;
        let url = endpoint(&self.base_url()?, "models");
        verify(&self.name, self.client.get(url).bearer_auth(key.expose_secret()), self.settings.timeout).await
    }
}

impl Provider for MistralProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn chat_caller(&self) -> Option<&dyn LargeLanguageCaller> {
        Some(self)
    }

    fn embedding_caller(&self) -> Option<&dyn EmbeddingCaller> {
        Some(self)
    }

    fn verifier(&self) -> &dyn Verifier {
        self
    }
}
