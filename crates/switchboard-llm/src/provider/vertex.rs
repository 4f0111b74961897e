//! Vertex AI adapter for Google publisher models
//!
//! Speaks the same `generateContent` format as Gemini, addressed through
//! the project and region and authorized with an OAuth access token.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use secrecy::ExposeSecret;
use switchboard_core::{
    ChatCompletionOptions, Credential, Embedding, EmbeddingOptions, IndexedContent, Message, ModelParameters,
    RequestContext, ResolvedCredential,
};
use url::Url;

use super::gemini::{bare_model, generate, stream_generate};
use super::{endpoint, exchange, fields, model_name};
use crate::call::Call;
use crate::caller::{
    EmbeddingCaller, LargeLanguageCaller, Provider, StreamSink, StreamingCaller, VerificationStatus, Verifier,
};
use crate::convert::ensure_history;
use crate::convert::google::{build_predict_request, build_request, parse_predict};
use crate::error::{CallResult, LlmError};
use crate::protocol::google::{GoogleRequest, VertexPredictResponse};
use crate::registry::ProviderSettings;
use crate::transport::verify;

/// Model checked when verification names none
const VERIFY_MODEL: &str = "gemini-2.0-flash";

/// Vertex AI adapter
pub struct VertexProvider {
    name: String,
    client: Client,
    credential: ResolvedCredential,
    settings: ProviderSettings,
}

impl VertexProvider {
    pub fn new(name: &str, credential: &Credential, settings: &ProviderSettings) -> Result<Self, LlmError> {
        Ok(Self {
            name: name.to_owned(),
            client: Client::new(),
            credential: credential.resolve()?,
            settings: settings.clone(),
        })
    }

    /// Regional endpoint unless a base URL override is present
    fn base_url(&self, region: &str) -> Result<Url, LlmError> {
        super::base_url(
            &self.credential,
            &self.settings,
            &format!("https://{region}-aiplatform.googleapis.com"),
        )
    }

    /// `…/publishers/google/models/{model}` for the credential's project
    fn model_url(&self, model: &str) -> Result<String, LlmError> {
        let project = self.credential.require(fields::PROJECT_ID)?;
        let region = self.credential.require(fields::REGION)?;
        let path = format!(
            "v1/projects/{project}/locations/{region}/publishers/google/models/{}",
            bare_model(model)
        );
        Ok(endpoint(&self.base_url(&region)?, &path))
    }

    fn authorize(&self, builder: RequestBuilder) -> Result<RequestBuilder, LlmError> {
        let token = self.credential.secret(fields::KEY)?;
        Ok(builder.bearer_auth(token.expose_secret()))
    }

    /// Authorized POST to `{model}:{method}`
    fn model_post(&self, params: &ModelParameters, method: &str) -> Result<RequestBuilder, LlmError> {
        let model = model_name(params)?;
        let url = format!("{}:{method}", self.model_url(&model)?);
        self.authorize(self.client.post(url))
    }

    fn chat_request(
        &self,
        history: &[Message],
        options: &ChatCompletionOptions,
        method: &str,
    ) -> Result<(RequestBuilder, GoogleRequest), LlmError> {
        ensure_history(history)?;
        let builder = self.model_post(&options.model_parameters, method)?;
        Ok((builder, build_request(history, options)))
    }
}

#[async_trait]
impl LargeLanguageCaller for VertexProvider {
    async fn chat_completion(&self, history: &[Message], options: &ChatCompletionOptions) -> CallResult<Message> {
        let call = Call::start(&self.name, options.request_id, &options.hooks);
        let (builder, request) = match self.chat_request(history, options, "generateContent") {
            Ok(prepared) => prepared,
            Err(e) => return Err(call.fail(e)),
        };
        generate(call, &self.name, builder, &request, self.settings.timeout).await
    }
}

#[async_trait]
impl StreamingCaller for VertexProvider {
    async fn stream_chat_completion(
        &self,
        history: &[Message],
        options: &ChatCompletionOptions,
        context: &RequestContext,
        sink: &mut dyn StreamSink,
    ) -> Result<(), LlmError> {
        let mut call = Call::start(&self.name, options.request_id, &options.hooks);
        let (builder, request) = match self.chat_request(history, options, "streamGenerateContent?alt=sse") {
            Ok(prepared) => prepared,
            Err(e) => {
                call.abort(&e);
                return Err(e);
            }
        };
        stream_generate(call, &self.name, builder, &request, self.settings.timeout, context, sink).await
    }
}

#[async_trait]
impl EmbeddingCaller for VertexProvider {
    async fn embedding(&self, content: &IndexedContent, options: &EmbeddingOptions) -> CallResult<Vec<Embedding>> {
        let mut call = Call::start(&self.name, options.request_id, &options.hooks);
        let params = &options.model_parameters;
        let request = build_predict_request(content, params);
        let builder = match self.model_post(params, "predict") {
            Ok(builder) => builder.json(&request),
            Err(e) => return Err(call.fail(e)),
        };

        call.dispatch(&request);
        let outcome = match exchange::<VertexPredictResponse>(&self.name, builder, self.settings.timeout).await {
            Ok((response, raw)) => {
                call.metrics_mut().add_usage(&response);
                parse_predict(content, &response).map(|embeddings| (embeddings, raw))
            }
            Err(e) => Err(e),
        };
        call.settle(outcome)
    }
}

#[async_trait]
impl Verifier for VertexProvider {
    /// Reads the publisher model named by `model.name`
    async fn verify_credential(&self, parameters: &ModelParameters) -> Result<VerificationStatus, LlmError> {
        let model = parameters.model_name().unwrap_or_else(|| VERIFY_MODEL.to_owned());
        let builder = self.authorize(self.client.get(self.model_url(&model)?))?;
        verify(&self.name, builder, self.settings.timeout).await
    }
}

impl Provider for VertexProvider {
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
