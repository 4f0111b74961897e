//! Hugging Face adapter
//!
//! Chat goes through the OpenAI-compatible inference router; embeddings
//! use the feature-extraction pipeline of the hosted inference API.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use secrecy::ExposeSecret;
use switchboard_core::{
    ChatCompletionOptions, Credential, Embedding, EmbeddingOptions, IndexedContent, Message, ModelParameters,
    ResolvedCredential,
};
use url::Url;

use super::openai::complete;
use super::{endpoint, exchange, fields, model_name};
use crate::call::Call;
use crate::caller::{EmbeddingCaller, LargeLanguageCaller, Provider, VerificationStatus, Verifier};
use crate::convert::ensure_history;
use crate::convert::openai::{Flavor, build_request};
use crate::error::{CallResult, LlmError};
use crate::ordering::{ordered_texts, restore_embeddings};
use crate::protocol::huggingface::{FeatureExtractionRequest, FeatureExtractionResponse};
use crate::registry::ProviderSettings;
use crate::transport::verify;

/// Default inference router URL
const DEFAULT_BASE_URL: &str = "https://router.huggingface.co";

/// Token introspection endpoint used for verification
const WHOAMI_URL: &str = "https://huggingface.co/api/whoami-v2";

/// Whether feature-extraction vectors are L2-normalized
const NORMALIZE: &str = "model.normalize";

/// Whether over-long inputs are truncated rather than rejected
const TRUNCATE: &str = "model.truncate";

/// Hugging Face adapter
pub struct HuggingFaceProvider {
    name: String,
    client: Client,
    credential: ResolvedCredential,
    settings: ProviderSettings,
}

impl HuggingFaceProvider {
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

    fn has_override(&self) -> bool {
        self.credential.optional(fields::BASE_URL).is_some() || self.settings.base_url.is_some()
    }

    fn authorize(&self, builder: RequestBuilder) -> Result<RequestBuilder, LlmError> {
        let key = self.credential.secret(fields::KEY)?;
        Ok(builder.bearer_auth(key.expose_secret()))
    }

    fn post(&self, path: &str) -> Result<RequestBuilder, LlmError> {
        let url = endpoint(&self.base_url()?, path);
        self.authorize(self.client.post(url))
    }
}

#[async_trait]
impl LargeLanguageCaller for HuggingFaceProvider {
    async fn chat_completion(&self, history: &[Message], options: &ChatCompletionOptions) -> CallResult<Message> {
        let call = Call::start(&self.name, options.request_id, &options.hooks);
        let prepared = ensure_history(history)
            .and_then(|()| model_name(&options.model_parameters))
            .and_then(|model| {
                let builder = self.post("v1/chat/completions")?;
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
impl EmbeddingCaller for HuggingFaceProvider {
    async fn embedding(&self, content: &IndexedContent, options: &EmbeddingOptions) -> CallResult<Vec<Embedding>> {
        let mut call = Call::start(&self.name, options.request_id, &options.hooks);
        let params = &options.model_parameters;
        let request = FeatureExtractionRequest {
            inputs: ordered_texts(content),
            normalize: params.boolean(NORMALIZE),
            truncate: params.boolean(TRUNCATE),
        };
        let prepared = model_name(params).and_then(|model| {
            self.post(&format!("hf-inference/models/{model}/pipeline/feature-extraction"))
        });
        let builder = match prepared {
            Ok(builder) => builder.json(&request),
            Err(e) => return Err(call.fail(e)),
        };

        call.dispatch(&request);
        let outcome = match exchange::<FeatureExtractionResponse>(&self.name, builder, self.settings.timeout).await {
            Ok((vectors, raw)) => {
                restore_embeddings(content, vectors.into_iter().enumerate()).map(|embeddings| (embeddings, raw))
            }
            Err(e) => Err(e),
        };
        call.settle(outcome)
    }
}

#[async_trait]
impl Verifier for HuggingFaceProvider {
    /// Checks the token with `whoami-v2` on the hub, or on the overriding
    /// host when one is configured
    async fn verify_credential(&self, _parameters: &ModelParameters) -> Result<VerificationStatus, LlmError> {
        let url = if self.has_override() {
            endpoint(&self.base_url()?, "api/whoami-v2")
        } else {
            WHOAMI_URL.to_owned()
        };
        let builder = self.authorize(self.client.get(url))?;
        verify(&self.name, builder, self.settings.timeout).await
    }
}

impl Provider for HuggingFaceProvider {
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

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::provider::testing::{credential, model, settings};

    fn provider(server: &MockServer) -> HuggingFaceProvider {
        HuggingFaceProvider::new("huggingface", &credential(), &settings(server)).unwrap()
    }

    #[tokio::test]
    async fn chat_goes_through_the_router() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hi there"}, "finish_reason": "stop"}],
                "usage": {"prompt_tokens": 4, "completion_tokens": 2, "total_tokens": 6}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let options = ChatCompletionOptions {
            model_parameters: model("meta-llama/Llama-3.1-8B-Instruct"),
            ..ChatCompletionOptions::default()
        };
        let completion = provider(&server)
            .chat_completion(&[Message::user("hi")], &options)
            .await
            .unwrap();

        assert_eq!(completion.data.text().as_deref(), Some("Hi there"));
    }

    #[tokio::test]
    async fn feature_extraction_vectors_follow_input_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(
                "/hf-inference/models/sentence-transformers/all-MiniLM-L6-v2/pipeline/feature-extraction",
            ))
            .and(body_json(json!({"inputs": ["first", "second"], "normalize": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([[0.1, 0.2], [0.3, 0.4]])))
            .mount(&server)
            .await;

        let content: IndexedContent = [(4, "first".to_owned()), (9, "second".to_owned())].into_iter().collect();
        let options = EmbeddingOptions {
            model_parameters: model("sentence-transformers/all-MiniLM-L6-v2").with(NORMALIZE, true),
            ..EmbeddingOptions::default()
        };
        let completion = provider(&server).embedding(&content, &options).await.unwrap();

        assert_eq!(completion.data[0].index, 4);
        assert_eq!(completion.data[1].index, 9);
        assert_eq!(completion.data[1].embedding, vec![0.3, 0.4]);
    }

    #[tokio::test]
    async fn short_vector_list_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([[0.1]])))
            .mount(&server)
            .await;

        let content: IndexedContent = [(0, "a".to_owned()), (1, "b".to_owned())].into_iter().collect();
        let options = EmbeddingOptions {
            model_parameters: model("bge-small"),
            ..EmbeddingOptions::default()
        };
        let err = provider(&server).embedding(&content, &options).await.unwrap_err();

        assert!(matches!(err.error, LlmError::Upstream { status: None, .. }));
    }

    #[tokio::test]
    async fn verify_uses_the_overriding_host() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/whoami-v2"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let status = provider(&server)
            .verify_credential(&ModelParameters::new())
            .await
            .unwrap();

        assert_eq!(status, VerificationStatus::Invalid);
    }
}
