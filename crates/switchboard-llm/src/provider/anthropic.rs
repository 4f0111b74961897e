//! Anthropic Messages API adapter

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use secrecy::ExposeSecret;
use switchboard_core::{ChatCompletionOptions, Credential, Message, ModelParameters, RequestContext, ResolvedCredential};
use url::Url;

use super::{endpoint, exchange, fields, model_name, run_stream};
use crate::call::Call;
use crate::caller::{LargeLanguageCaller, Provider, StreamSink, StreamingCaller, VerificationStatus, Verifier};
use crate::convert::anthropic::{AnthropicStreamState, build_request, parse_response};
use crate::convert::ensure_history;
use crate::error::{CallResult, LlmError};
use crate::protocol::anthropic::{AnthropicRequest, AnthropicResponse};
use crate::registry::ProviderSettings;
use crate::transport::verify;

/// Default Anthropic API base URL
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Anthropic API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic adapter
pub struct AnthropicProvider {
    name: String,
    client: Client,
    credential: ResolvedCredential,
    settings: ProviderSettings,
}

impl AnthropicProvider {
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
        Ok(builder
            .header("x-api-key", key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION))
    }

    fn messages_request(
        &self,
        history: &[Message],
        options: &ChatCompletionOptions,
        stream: bool,
    ) -> Result<(RequestBuilder, AnthropicRequest), LlmError> {
        ensure_history(history)?;
        let model = model_name(&options.model_parameters)?;
        let url = endpoint(&self.base_url()?, "v1/messages");
        let builder = self.authorize(self.client.post(url))?;
        let request = build_request(model, history, options, stream);
        Ok((builder.json(&request), request))
    }
}

#[async_trait]
impl LargeLanguageCaller for AnthropicProvider {
    async fn chat_completion(&self, history: &[Message], options: &ChatCompletionOptions) -> CallResult<Message> {
        let mut call = Call::start(&self.name, options.request_id, &options.hooks);
        let (builder, request) = match self.messages_request(history, options, false) {
            Ok(prepared) => prepared,
            Err(e) => return Err(call.fail(e)),
        };

        call.dispatch(&request);
        let outcome = exchange::<AnthropicResponse>(&self.name, builder, self.settings.timeout)
            .await
            .map(|(response, raw)| {
                if let Some(usage) = &response.usage {
                    call.metrics_mut().add_usage(usage);
                }
                (Message::Assistant(parse_response(response)), raw)
            });
        call.settle(outcome)
    }
}

#[async_trait]
impl StreamingCaller for AnthropicProvider {
    async fn stream_chat_completion(
        &self,
        history: &[Message],
        options: &ChatCompletionOptions,
        context: &RequestContext,
        sink: &mut dyn StreamSink,
    ) -> Result<(), LlmError> {
        let mut call = Call::start(&self.name, options.request_id, &options.hooks);
        let (builder, request) = match self.messages_request(history, options, true) {
            Ok(prepared) => prepared,
            Err(e) => {
                call.abort(&e);
                return Err(e);
            }
        };

        call.dispatch(&request);
        let mut state = AnthropicStreamState::new();
        run_stream(call, &self.name, builder, self.settings.timeout, context, sink, move |_, data| {
            state.frame_events(data)
        })
        .await
    }
}

#[async_trait]
impl Verifier for AnthropicProvider {
    async fn verify_credential(&self, _parameters: &ModelParameters) -> Result<VerificationStatus, LlmError> {
        let url = endpoint(&self.base_url()?, "v1/models");
        let builder = self.authorize(self.client.get(url))?;
        verify(&self.name, builder, self.settings.timeout).await
    }
}

impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn chat_caller(&self) -> Option<&dyn LargeLanguageCaller> {
        Some(self)
    }

    fn streaming_caller(&self) -> Option<&dyn StreamingCaller> {
        Some(self)
    }

    fn verifier(&self) -> &dyn Verifier {
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};
    use switchboard_core::metrics::names;
    use switchboard_core::{Metric, ToolDefinition};
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::provider::testing::{RecordingSink, credential, model, settings};

    fn provider(server: &MockServer) -> AnthropicProvider {
        AnthropicProvider::new("anthropic", &credential(), &settings(server)).unwrap()
    }

    fn options() -> ChatCompletionOptions {
        ChatCompletionOptions {
            model_parameters: model("claude-sonnet-4-5"),
            tool_definitions: vec![ToolDefinition::function("weather", None, None)],
            ..ChatCompletionOptions::default()
        }
    }

    fn frames(events: &[Value]) -> String {
        events
            .iter()
            .map(|e| format!("event: {}\ndata: {e}\n\n", e["type"].as_str().unwrap()))
            .collect()
    }

    fn metric<'a>(metrics: &'a [Metric], name: &str) -> Option<&'a str> {
        metrics.iter().find(|m| m.name == name).map(|m| m.value.as_str())
    }

    #[tokio::test]
    async fn tool_use_response_keeps_text_and_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .and(body_partial_json(json!({"model": "claude-sonnet-4-5", "max_tokens": 1024})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "msg_1",
                "model": "claude-sonnet-4-5",
                "content": [
                    {"type": "text", "text": "Checking."},
                    {"type": "tool_use", "id": "toolu_1", "name": "weather", "input": {"city": "Oslo"}}
                ],
                "stop_reason": "tool_use",
                "usage": {"input_tokens": 20, "output_tokens": 7, "cache_read_input_tokens": 4}
            })))
            .mount(&server)
            .await;

        let completion = provider(&server)
            .chat_completion(&[Message::user("weather in Oslo?")], &options())
            .await
            .unwrap();

        let Message::Assistant(message) = &completion.data else {
            panic!("expected assistant message");
        };
        assert_eq!(message.tool_calls[0].id, "toolu_1");
        assert_eq!(message.tool_calls[0].function.arguments, r#"{"city":"Oslo"}"#);
        assert_eq!(metric(&completion.metrics, names::CACHED_INPUT_TOKEN), Some("4"));
        assert_eq!(metric(&completion.metrics, names::TOTAL_TOKEN), Some("27"));
    }

    #[tokio::test]
    async fn stream_with_tool_use_withholds_tokens() {
        let server = MockServer::start().await;
        let body = frames(&[
            json!({"type": "message_start", "message": {"id": "msg_1", "usage": {"input_tokens": 12}}}),
            json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "One"}}),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": " moment"}}),
            json!({"type": "content_block_stop", "index": 0}),
            json!({"type": "content_block_start", "index": 1, "content_block": {"type": "tool_use", "id": "toolu_1", "name": "weather"}}),
            json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "{\"city\":"}}),
            json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "\"Oslo\"}"}}),
            json!({"type": "content_block_stop", "index": 1}),
            json!({"type": "message_delta", "delta": {"stop_reason": "tool_use"}, "usage": {"output_tokens": 9}}),
            json!({"type": "message_stop"}),
        ]);
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let mut sink = RecordingSink::default();
        provider(&server)
            .stream_chat_completion(&[Message::user("weather?")], &options(), &RequestContext::empty(), &mut sink)
            .await
            .unwrap();

        assert!(sink.tokens.is_empty());
        assert_eq!(sink.completed.len(), 1);
        let (Message::Assistant(message), metrics) = &sink.completed[0] else {
            panic!("expected assistant message");
        };
        assert_eq!(message.text(), "One moment");
        assert_eq!(message.tool_calls[0].function.arguments, r#"{"city":"Oslo"}"#);
        assert_eq!(metric(metrics, names::INPUT_TOKEN), Some("12"));
        assert_eq!(metric(metrics, names::OUTPUT_TOKEN), Some("9"));
    }

    #[tokio::test]
    async fn stream_error_event_reaches_the_sink() {
        let server = MockServer::start().await;
        let body = frames(&[
            json!({"type": "message_start", "message": {"id": "msg_1"}}),
            json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}),
        ]);
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let mut sink = RecordingSink::default();
        let err = provider(&server)
            .stream_chat_completion(&[Message::user("hi")], &options(), &RequestContext::empty(), &mut sink)
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::Streaming(_)));
        assert_eq!(sink.errors.len(), 1);
        assert!(sink.completed.is_empty());
    }

    #[tokio::test]
    async fn cancelled_request_touches_no_callbacks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(String::new(), "text/event-stream"))
            .mount(&server)
            .await;

        let cancellation = CancellationToken::new();
        cancellation.cancel();
        let context = RequestContext {
            cancellation,
            ..RequestContext::default()
        };

        let mut sink = RecordingSink::default();
        let err = provider(&server)
            .stream_chat_completion(&[Message::user("hi")], &options(), &context, &mut sink)
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::Cancelled));
        assert!(sink.errors.is_empty());
        assert!(sink.completed.is_empty());
    }

    #[tokio::test]
    async fn empty_history_never_reaches_the_vendor() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = provider(&server).chat_completion(&[], &options()).await.unwrap_err();
        assert_eq!(err.error.to_string(), "invalid request: no messages in the input");
    }
}
