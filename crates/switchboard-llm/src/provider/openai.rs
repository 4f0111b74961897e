//! `OpenAI` adapter, plus the exchanges shared by every vendor that speaks
//! the chat completions format

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use secrecy::ExposeSecret;
use switchboard_core::{
    ChatCompletionOptions, Credential, Embedding, EmbeddingOptions, IndexedContent, Message, ModelParameters,
    RequestContext, ResolvedCredential,
};
use url::Url;

use super::{endpoint, exchange, fields, model_name, run_stream};
use crate::call::Call;
use crate::caller::{
    EmbeddingCaller, LargeLanguageCaller, Provider, StreamSink, StreamingCaller, VerificationStatus, Verifier,
};
use crate::convert::openai::{Flavor, build_embedding_request, build_request, frame_events, parse_embeddings, parse_response};
use crate::convert::ensure_history;
use crate::error::{CallResult, LlmError};
use crate::protocol::openai::{OpenAiEmbeddingRequest, OpenAiEmbeddingResponse, OpenAiRequest, OpenAiResponse};
use crate::registry::ProviderSettings;
use crate::transport::verify;

/// Default `OpenAI` API base URL
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Unary chat exchange for a chat completions endpoint
pub(crate) async fn complete(
    mut call: Call<'_>,
    provider: &str,
    builder: RequestBuilder,
    request: &OpenAiRequest,
    timeout: Duration,
) -> CallResult<Message> {
    call.dispatch(request);
    let outcome = exchange::<OpenAiResponse>(provider, builder.json(request), timeout)
        .await
        .map(|(response, raw)| {
            if let Some(usage) = &response.usage {
                call.metrics_mut().add_usage(usage);
            }
            (Message::Assistant(parse_response(response)), raw)
        });
    call.settle(outcome)
}

/// Streaming chat exchange for a chat completions endpoint
pub(crate) async fn stream(
    mut call: Call<'_>,
    provider: &str,
    builder: RequestBuilder,
    request: &OpenAiRequest,
    timeout: Duration,
    context: &RequestContext,
    sink: &mut dyn StreamSink,
) -> Result<(), LlmError> {
    call.dispatch(request);
    run_stream(call, provider, builder.json(request), timeout, context, sink, |_, data| frame_events(data)).await
}

/// Embeddings exchange for an embeddings endpoint
pub(crate) async fn embed(
    mut call: Call<'_>,
    provider: &str,
    builder: RequestBuilder,
    request: &OpenAiEmbeddingRequest,
    content: &IndexedContent,
    timeout: Duration,
) -> CallResult<Vec<Embedding>> {
    call.dispatch(request);
    let outcome = match exchange::<OpenAiEmbeddingResponse>(provider, builder.json(request), timeout).await {
        Ok((response, raw)) => {
            if let Some(usage) = &response.usage {
                call.metrics_mut().add_usage(usage);
            }
            parse_embeddings(content, response).map(|embeddings| (embeddings, raw))
        }
        Err(e) => Err(e),
    };
    call.settle(outcome)
}

/// `OpenAI` adapter
pub struct OpenAiProvider {
    name: String,
    client: Client,
    credential: ResolvedCredential,
    settings: ProviderSettings,
}

impl OpenAiProvider {
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

    /// Authorized POST to `path`
    fn post(&self, path: &str) -> Result<RequestBuilder, LlmError> {
        let key = self.credential.secret(fields::KEY)?;
        let url = endpoint(&self.base_url()?, path);
        Ok(self.client.post(url).bearer_auth(key.expose_secret()))
    }

    fn chat_request(
        &self,
        history: &[Message],
        options: &ChatCompletionOptions,
        stream: bool,
    ) -> Result<(RequestBuilder, OpenAiRequest), LlmError> {
        ensure_history(history)?;
        let model = model_name(&options.model_parameters)?;
        let builder = self.post("chat/completions")?;
        Ok((builder, build_request(model, history, options, Flavor::Native, stream)))
    }
}

#[async_trait]
impl LargeLanguageCaller for OpenAiProvider {
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
impl StreamingCaller for OpenAiProvider {
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
impl EmbeddingCaller for OpenAiProvider {
    async fn embedding(&self, content: &IndexedContent, options: &EmbeddingOptions) -> CallResult<Vec<Embedding>> {
        let call = Call::start(&self.name, options.request_id, &options.hooks);
        let prepared = model_name(&options.model_parameters).and_then(|model| {
            let builder = self.post("embeddings")?;
            Ok((builder, build_embedding_request(model, content, &options.model_parameters, Flavor::Native)))
        });
        let (builder, request) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => return Err(call.fail(e)),
        };
        embed(call, &self.name, builder, &request, content, self.settings.timeout).await
    }
}

#[async_trait]
impl Verifier for OpenAiProvider {
    async fn verify_credential(&self, _parameters: &ModelParameters) -> Result<VerificationStatus, LlmError> {
        let key = self.credential.secret(fields::KEY)?;
        let url = endpoint(&self.base_url()?, "models");
        verify(&self.name, self.client.get(url).bearer_auth(key.expose_secret()), self.settings.timeout).await
    }
}

impl Provider for OpenAiProvider {
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
