//! Azure `OpenAI` adapter
//!
//! Same wire format as `OpenAI`, addressed by deployment under the
//! resource endpoint and authorized with an `api-key` header.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use secrecy::ExposeSecret;
use switchboard_core::{
    ChatCompletionOptions, Credential, Embedding, EmbeddingOptions, IndexedContent, Message, ModelParameters,
    RequestContext, ResolvedCredential,
};
use url::Url;

use super::openai::{complete, embed, stream};
use super::{fields, model_name};
use crate::call::Call;
use crate::caller::{
    EmbeddingCaller, LargeLanguageCaller, Provider, StreamSink, StreamingCaller, VerificationStatus, Verifier,
};
use crate::convert::ensure_history;
use crate::convert::openai::{Flavor, build_embedding_request, build_request};
use crate::error::{CallResult, LlmError};
use crate::protocol::openai::OpenAiRequest;
use crate::registry::ProviderSettings;
use crate::transport::verify;

/// API version used when the credential does not pin one
pub const DEFAULT_API_VERSION: &str = "2024-10-21";

/// Azure `OpenAI` adapter
pub struct AzureOpenAiProvider {
    name: String,
    client: Client,
    credential: ResolvedCredential,
    settings: ProviderSettings,
}

impl AzureOpenAiProvider {
    pub fn new(name: &str, credential: &Credential, settings: &ProviderSettings) -> Result<Self, LlmError> {
        Ok(Self {
            name: name.to_owned(),
            client: Client::new(),
            credential: credential.resolve()?,
            settings: settings.clone(),
        })
    }

    /// Resource endpoint; a `base_url` override replaces it
    fn resource(&self) -> Result<Url, LlmError> {
        let raw = match self.credential.optional(fields::BASE_URL) {
            Some(url) => url,
            None => match &self.settings.base_url {
                Some(url) => return Ok(url.clone()),
                None => self.credential.require(fields::ENDPOINT)?,
            },
        };
        Url::parse(&raw).map_err(|e| LlmError::InvalidRequest(format!("invalid Azure endpoint `{raw}`: {e}")))
    }

    fn api_version(&self) -> String {
        self.credential
            .optional(fields::API_VERSION)
            .unwrap_or_else(|| DEFAULT_API_VERSION.to_owned())
    }

    fn url(&self, path: &str) -> Result<String, LlmError> {
        let resource = self.resource()?;
        Ok(format!(
            "{}?api-version={}",
            super::endpoint(&resource, path),
            self.api_version()
        ))
    }

    fn authorize(&self, builder: RequestBuilder) -> Result<RequestBuilder, LlmError> {
        let key = self.credential.secret(fields::SUBSCRIPTION_KEY)?;
        Ok(builder.header("api-key", key.expose_secret()))
    }

    /// Authorized POST to `operation` on the deployment named by `model.name`
    fn deployment_post(&self, params: &ModelParameters, operation: &str) -> Result<(RequestBuilder, String), LlmError> {
        let deployment = model_name(params)?;
        let url = self.url(&format!("openai/deployments/{deployment}/{operation}"))?;
        Ok((self.authorize(self.client.post(url))?, deployment))
    }

    fn chat_request(
        &self,
        history: &[Message],
        options: &ChatCompletionOptions,
        stream: bool,
    ) -> Result<(RequestBuilder, OpenAiRequest), LlmError> {
        ensure_history(history)?;
        let (builder, deployment) = self.deployment_post(&options.model_parameters, "chat/completions")?;
        Ok((builder, build_request(deployment, history, options, Flavor::Native, stream)))
    }
}

#[async_trait]
impl LargeLanguageCaller for AzureOpenAiProvider {
    async fn chat_completion(&self, history: &[Message], options: &ChatCompletionOptions) -> CallResult<Message> {
        let call = Call::start(&self.name, options.request_id, &options.hooks);
        let (builder, request) = match self.chat_request(history, options, false) {
            Ok(prepared) => prepared,
            Err(e) => return Err(call.fail(e)),
        };
        complete(call, &self.name, builder, &request, self.settings.timeout).await
    }
}

#[async_trait]
impl StreamingCaller for AzureOpenAiProvider {
    async fn stream_chat_completion(
        &self,
        history: &[Message],
        options: &ChatCompletionOptions,
        context: &RequestContext,
        sink: &mut dyn StreamSink,
    ) -> Result<(), LlmError> {
        let mut call = Call::start(&self.name, options.request_id, &options.hooks);
        let (builder, request) = match self.chat_request(history, options, true) {
            Ok(prepared) => prepared,
            Err(e) => {
                call.abort(&e);
                return Err(e);
            }
        };
        stream(call, &self.name, builder, &request, self.settings.timeout, context, sink).await
    }
}

#[async_trait]
impl EmbeddingCaller for AzureOpenAiProvider {
    async fn embedding(&self, content: &IndexedContent, options: &EmbeddingOptions) -> CallResult<Vec<Embedding>> {
        let call = Call::start(&self.name, options.request_id, &options.hooks);
        let params = &options.model_parameters;
        let (builder, request) = match self.deployment_post(params, "embeddings") {
            Ok((builder, deployment)) => (builder, build_embedding_request(deployment, content, params, Flavor::Native)),
            Err(e) => return Err(call.fail(e)),
        };
        embed(call, &self.name, builder, &request, content, self.settings.timeout).await
    }
}

#[async_trait]
impl Verifier for AzureOpenAiProvider {
    async fn verify_credential(&self, _parameters: &ModelParameters) -> Result<VerificationStatus, LlmError> {
        let url = self.url("openai/models")?;
        let builder = self.authorize(self.client.get(url))?;
        verify(&self.name, builder, self.settings.timeout).await
    }
}

impl Provider for AzureOpenAiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn chat_caller(&self) -> Option<&dyn LargeLanguageCaller> {
        Some(self)
    }

    fn streaming_caller(&self) -> Option<&dyn StreamingCaller> {
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
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::provider::testing::model;

    fn provider(server: &MockServer, api_version: Option<&str>) -> AzureOpenAiProvider {
        let mut value = json!({"subscription_key": "azure-key", "endpoint": server.uri()});
        if let Some(version) = api_version {
            value["api_version"] = json!(version);
        }
        AzureOpenAiProvider::new("azure", &Credential::new(5, value), &ProviderSettings::default()).unwrap()
    }

    #[tokio::test]
    async fn chat_targets_the_deployment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/deployments/gpt4o-prod/chat/completions"))
            .and(query_param("api-version", "2025-01-01-preview"))
            .and(header("api-key", "azure-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"index": 0, "message": {"role": "assistant", "content": "ok"}, "finish_reason": "stop"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let options = ChatCompletionOptions {
            model_parameters: model("gpt4o-prod"),
            ..ChatCompletionOptions::default()
        };
        let completion = provider(&server, Some("2025-01-01-preview"))
            .chat_completion(&[Message::user("hi")], &options)
            .await
            .unwrap();

        assert_eq!(completion.data.text().as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn missing_endpoint_is_a_credential_error() {
        let provider = AzureOpenAiProvider::new(
            "azure",
            &Credential::new(5, json!({"subscription_key": "k"})),
            &ProviderSettings::default(),
        )
        .unwrap();

        let err = provider.verify_credential(&ModelParameters::new()).await.unwrap_err();
        assert!(matches!(err, LlmError::Credential(_)));
    }

    #[tokio::test]
    async fn verification_uses_default_api_version() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/openai/models"))
            .and(query_param("api-version", DEFAULT_API_VERSION))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let status = provider(&server, None).verify_credential(&ModelParameters::new()).await.unwrap();
        assert_eq!(status, VerificationStatus::Invalid);
    }
}
