//! Gemini API adapter, registered as both `gemini` and `google`
//!
//! Also holds the `generateContent` exchanges Vertex AI reuses.

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
use crate::convert::ensure_history;
use crate::convert::google::{
    GoogleStreamState, build_batch_embed_request, build_request, parse_batch_embed, parse_response,
};
use crate::error::{CallResult, LlmError};
use crate::protocol::google::{GoogleBatchEmbedResponse, GoogleRequest, GoogleResponse};
use crate::registry::ProviderSettings;
use crate::transport::verify;

/// Default Gemini API base URL
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Model name without the `models/` resource prefix
pub(crate) fn bare_model(model: &str) -> &str {
    model.strip_prefix("models/").unwrap_or(model)
}

/// Unary `generateContent` exchange
pub(crate) async fn generate(
    mut call: Call<'_>,
    provider: &str,
    builder: RequestBuilder,
    request: &GoogleRequest,
    timeout: Duration,
) -> CallResult<Message> {
    call.dispatch(request);
    let outcome = exchange::<GoogleResponse>(provider, builder.json(request), timeout)
        .await
        .map(|(response, raw)| {
            if let Some(usage) = &response.usage_metadata {
                call.metrics_mut().add_usage(usage);
            }
            (Message::Assistant(parse_response(response)), raw)
        });
    call.settle(outcome)
}

/// `streamGenerateContent?alt=sse` exchange
pub(crate) async fn stream_generate(
    mut call: Call<'_>,
    provider: &str,
    builder: RequestBuilder,
    request: &GoogleRequest,
    timeout: Duration,
    context: &RequestContext,
    sink: &mut dyn StreamSink,
) -> Result<(), LlmError> {
    call.dispatch(request);
    let mut state = GoogleStreamState::new();
    run_stream(call, provider, builder.json(request), timeout, context, sink, move |_, data| {
        state.frame_events(data)
    })
    .await
}

/// Gemini adapter
pub struct GeminiProvider {
    name: String,
    client: Client,
    credential: ResolvedCredential,
    settings: ProviderSettings,
}

impl GeminiProvider {
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

    fn authorize(&self, builder: RequestBuilder) -> Result<RequestBuilder, LlmError> {
        let key = self.credential.secret(fields::KEY)?;
        Ok(builder.header("x-goog-api-key", key.expose_secret()))
    }

    /// Authorized POST to `models/{model}:{method}`
    fn model_post(&self, params: &ModelParameters, method: &str) -> Result<RequestBuilder, LlmError> {
        let model = model_name(params)?;
        let url = endpoint(&self.base_url()?, &format!("v1beta/models/{}:{method}", bare_model(&model)));
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
impl LargeLanguageCaller for GeminiProvider {
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
impl StreamingCaller for GeminiProvider {
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
impl EmbeddingCaller for GeminiProvider {
    async fn embedding(&self, content: &IndexedContent, options: &EmbeddingOptions) -> CallResult<Vec<Embedding>> {
        let mut call = Call::start(&self.name, options.request_id, &options.hooks);
        let params = &options.model_parameters;
        let prepared = model_name(params).and_then(|model| {
            let request = build_batch_embed_request(bare_model(&model), content, params);
            let builder = self.model_post(params, "batchEmbedContents")?;
            Ok((builder.json(&request), request))
        });
        let (builder, request) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => return Err(call.fail(e)),
        };

        call.dispatch(&request);
        let outcome = match exchange::<GoogleBatchEmbedResponse>(&self.name, builder, self.settings.timeout).await {
            Ok((response, raw)) => parse_batch_embed(content, response).map(|embeddings| (embeddings, raw)),
            Err(e) => Err(e),
        };
        call.settle(outcome)
    }
}

#[async_trait]
impl Verifier for GeminiProvider {
    async fn verify_credential(&self, _parameters: &ModelParameters) -> Result<VerificationStatus, LlmError> {
        let url = endpoint(&self.base_url()?, "v1beta/models");
        let builder = self.authorize(self.client.get(url))?;
        verify(&self.name, builder, self.settings.timeout).await
    }
}

impl Provider for GeminiProvider {
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
    use switchboard_core::ToolDefinition;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::provider::testing::{RecordingSink, credential, model, settings};

    fn provider(server: &MockServer) -> GeminiProvider {
        GeminiProvider::new("gemini", &credential(), &settings(server)).unwrap()
    }

    #[test]
    fn resource_prefix_is_stripped() {
        assert_eq!(bare_model("models/gemini-2.0-flash"), "gemini-2.0-flash");
        assert_eq!(bare_model("gemini-2.0-flash"), "gemini-2.0-flash");
    }

    #[tokio::test]
    async fn function_calls_get_candidate_ids() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "index": 0,
                    "content": {"role": "model", "parts": [
                        {"functionCall": {"name": "weather", "args": {"city": "Oslo"}}}
                    ]},
                    "finishReason": "STOP"
                }],
                "usageMetadata": {"promptTokenCount": 8, "candidatesTokenCount": 2, "totalTokenCount": 10}
            })))
            .mount(&server)
            .await;

        let options = ChatCompletionOptions {
            model_parameters: model("models/gemini-2.0-flash"),
            tool_definitions: vec![ToolDefinition::function("weather", None, None)],
            ..ChatCompletionOptions::default()
        };
        let completion = provider(&server)
            .chat_completion(&[Message::user("weather?")], &options)
            .await
            .unwrap();

        let Message::Assistant(message) = &completion.data else {
            panic!("expected assistant message");
        };
        assert_eq!(message.tool_calls[0].id, "call_0_0");
        assert_eq!(message.tool_calls[0].function.arguments, r#"{"city":"Oslo"}"#);
    }

    #[tokio::test]
    async fn stream_uses_sse_alt_and_forwards_text() {
        let server = MockServer::start().await;
        let body = [
            json!({"candidates": [{"index": 0, "content": {"role": "model", "parts": [{"text": "Hei"}]}}]}),
            json!({"candidates": [{"index": 0, "content": {"role": "model", "parts": [{"text": " du"}]}, "finishReason": "STOP"}],
                   "usageMetadata": {"promptTokenCount": 3, "candidatesTokenCount": 2}}),
        ]
        .iter()
        .map(|c| format!("data: {c}\r\n\r\n"))
        .collect::<String>();
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash:streamGenerateContent"))
            .and(query_param("alt", "sse"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let options = ChatCompletionOptions {
            model_parameters: model("gemini-2.0-flash"),
            ..ChatCompletionOptions::default()
        };
        let mut sink = RecordingSink::default();
        provider(&server)
            .stream_chat_completion(&[Message::user("hei")], &options, &RequestContext::empty(), &mut sink)
            .await
            .unwrap();

        assert_eq!(sink.tokens, vec!["Hei", " du"]);
        assert_eq!(sink.completed.len(), 1);
    }

    #[tokio::test]
    async fn batch_embeddings_keep_indices() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/text-embedding-004:batchEmbedContents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "embeddings": [{"values": [0.5]}, {"values": [0.7]}]
            })))
            .mount(&server)
            .await;

        let content: IndexedContent = [(3, "x".to_owned()), (8, "y".to_owned())].into_iter().collect();
        let options = EmbeddingOptions {
            model_parameters: model("text-embedding-004"),
            ..EmbeddingOptions::default()
        };
        let completion = provider(&server).embedding(&content, &options).await.unwrap();

        let indices: Vec<u32> = completion.data.iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![3, 8]);
    }
}
