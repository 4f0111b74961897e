//! Conversion between the canonical model and the `OpenAI` wire format
//!
//! Azure `OpenAI`, Mistral and the Hugging Face router speak the same
//! format; [`Flavor`] selects which of the `OpenAI`-only parameters are sent.

use serde_json::{Value, json};
use switchboard_core::params::keys;
use switchboard_core::{
    AssistantMessage, ChatCompletionOptions, Embedding, IndexedContent, Message, ModelParameters, TokenUsage, ToolCall,
    ToolDefinition, UsageMetrics,
};

use super::{ChoiceOutput, assemble};
use crate::error::LlmError;
use crate::ordering;
use crate::protocol::openai::{
    OpenAiEmbeddingRequest, OpenAiEmbeddingResponse, OpenAiFunction, OpenAiFunctionCall, OpenAiMessage,
    OpenAiRequest, OpenAiResponse, OpenAiStreamChunk, OpenAiStreamOptions, OpenAiTool, OpenAiToolCall, OpenAiUsage,
};
use crate::stream::{Arguments, StreamEvent};

/// Which dialect of the chat completions API the vendor speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    /// `OpenAI` and Azure `OpenAI`: every parameter is understood
    Native,
    /// Compatible vendors reject `OpenAI`-only parameters
    Compatible,
}

// -- Outbound: canonical history -> OpenAI wire request --

/// Build the vendor message list from a canonical history
pub fn build_messages(history: &[Message]) -> Vec<OpenAiMessage> {
    let mut messages = Vec::with_capacity(history.len());

    for message in history {
        match message {
            Message::System(m) => {
                if let Some(content) = super::system_text(&m.content) {
                    messages.push(text_message("system", content));
                }
            }
            Message::User(m) => messages.push(text_message("user", m.content.clone())),
            Message::Assistant(m) => {
                if m.is_empty() {
                    continue;
                }
                let text = m.text();
                let tool_calls: Vec<OpenAiToolCall> = m
                    .tool_calls
                    .iter()
                    .map(|tc| OpenAiToolCall {
                        id: tc.id.clone(),
                        tool_type: "function".to_owned(),
                        function: OpenAiFunctionCall {
                            name: tc.function.name.clone(),
                            arguments: tc.function.arguments.clone(),
                        },
                    })
                    .collect();

                messages.push(OpenAiMessage {
                    role: "assistant".to_owned(),
                    content: if text.is_empty() { None } else { Some(text) },
                    tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
                    tool_call_id: None,
                });
            }
            Message::Tool(m) => {
                // one vendor message per result
                messages.extend(m.tools.iter().map(|result| OpenAiMessage {
                    role: "tool".to_owned(),
                    content: Some(result.content.clone()),
                    tool_calls: None,
                    tool_call_id: Some(result.id.clone()),
                }));
            }
        }
    }

    messages
}

fn text_message(role: &str, content: String) -> OpenAiMessage {
    OpenAiMessage {
        role: role.to_owned(),
        content: Some(content),
        tool_calls: None,
        tool_call_id: None,
    }
}

/// Tool definitions in `OpenAI` form, or `None` when there are none
pub fn build_tools(tools: &[ToolDefinition]) -> Option<Vec<OpenAiTool>> {
    if tools.is_empty() {
        return None;
    }
    Some(
        tools
            .iter()
            .map(|t| OpenAiTool {
                tool_type: "function".to_owned(),
                function: OpenAiFunction {
                    name: t.function.name.clone(),
                    description: t.function.description.clone(),
                    parameters: t.function.parameters_or_empty(),
                },
            })
            .collect(),
    )
}

/// Build a chat request; `stream` also asks for a final usage chunk
pub fn build_request(
    model: String,
    history: &[Message],
    options: &ChatCompletionOptions,
    flavor: Flavor,
    stream: bool,
) -> OpenAiRequest {
    let params = &options.model_parameters;
    let tools = build_tools(&options.tool_definitions);
    let tool_choice = tools.as_ref().and_then(|_| parse_tool_choice(params));
    let stop = params.string_list(keys::STOP);

    let mut request = OpenAiRequest {
        model,
        messages: build_messages(history),
        temperature: params.float(keys::TEMPERATURE),
        top_p: params.float(keys::TOP_P),
        max_tokens: params.unsigned(keys::MAX_COMPLETION_TOKENS),
        stop: if stop.is_empty() { None } else { Some(stop) },
        frequency_penalty: params.float(keys::FREQUENCY_PENALTY),
        presence_penalty: params.float(keys::PRESENCE_PENALTY),
        seed: params.integer(keys::SEED),
        response_format: response_format(params),
        tools,
        tool_choice,
        ..OpenAiRequest::default()
    };

    if flavor == Flavor::Native {
        request.user = params.string(keys::USER);
        request.reasoning_effort = params.string(keys::REASONING_EFFORT);
        request.service_tier = params.string(keys::SERVICE_TIER);
        request.top_logprobs = params.unsigned(keys::TOP_LOGPROBS);
        request.logprobs = request.top_logprobs.map(|_| true);
        request.metadata = params.string_map(keys::METADATA);
    }

    if stream {
        request.stream = Some(true);
        if flavor == Flavor::Native {
            request.stream_options = Some(OpenAiStreamOptions { include_usage: true });
        }
    }

    request
}

/// `auto`, `required` or `none`; anything else is sent as `none`
fn parse_tool_choice(params: &ModelParameters) -> Option<String> {
    let choice = params.string(keys::TOOL_CHOICE)?;
    let choice = match choice.as_str() {
        "auto" | "required" | "none" => choice,
        other => {
            tracing::debug!(tool_choice = other, "unknown tool choice, disabling tools");
            "none".to_owned()
        }
    };
    Some(choice)
}

/// `{type, json_schema}` from the `model.response_format` object
fn response_format(params: &ModelParameters) -> Option<Value> {
    let format = params.object(keys::RESPONSE_FORMAT)?;
    let format_type = format.get("type").and_then(Value::as_str)?;
    match format_type {
        "text" | "json_object" => Some(json!({ "type": format_type })),
        "json_schema" => {
            let schema = format.get("json_schema")?;
            Some(json!({ "type": "json_schema", "json_schema": schema }))
        }
        other => {
            tracing::debug!(response_format = other, "ignoring unknown response format");
            None
        }
    }
}

// -- Inbound: OpenAI wire response -> canonical message --

/// Parse a unary response into the assistant message
pub fn parse_response(response: OpenAiResponse) -> AssistantMessage {
    assemble(response.choices.into_iter().map(|choice| ChoiceOutput {
        finish: choice.finish_reason,
        text: choice.message.content,
        tool_calls: choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .filter(|tc| tc.tool_type == "function")
            .map(|tc| ToolCall::function(tc.id, tc.function.name, tc.function.arguments))
            .collect(),
    }))
}

impl UsageMetrics for OpenAiUsage {
    fn token_usage(&self) -> TokenUsage {
        TokenUsage {
            total: Some(self.total_tokens),
            cached_input: self.prompt_tokens_details.as_ref().and_then(|d| d.cached_tokens),
            reasoning: self.completion_tokens_details.as_ref().and_then(|d| d.reasoning_tokens),
            ..TokenUsage::new(self.prompt_tokens, self.completion_tokens)
        }
    }
}

// -- Stream conversion --

/// Translate one SSE `data:` payload into canonical events
///
/// `[DONE]` ends the stream; an `error` object aborts it. Payloads that do
/// not parse as a chunk are skipped.
pub fn frame_events(data: &str) -> Result<Vec<StreamEvent>, LlmError> {
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(vec![StreamEvent::Done]);
    }
    if data.is_empty() {
        return Ok(Vec::new());
    }

    let value: Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(error = %e, data = %data, "skipping unparseable SSE chunk");
            return Ok(Vec::new());
        }
    };

    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| error.to_string(), ToOwned::to_owned);
        return Err(LlmError::Streaming(message));
    }

    match serde_json::from_value::<OpenAiStreamChunk>(value) {
        Ok(chunk) => Ok(chunk_events(&chunk)),
        Err(e) => {
            tracing::debug!(error = %e, "skipping SSE chunk with unexpected shape");
            Ok(Vec::new())
        }
    }
}

/// Translate a parsed stream chunk into canonical events
pub fn chunk_events(chunk: &OpenAiStreamChunk) -> Vec<StreamEvent> {
    let mut events = Vec::new();

    for choice in &chunk.choices {
        if let Some(text) = choice.delta.content.as_ref().filter(|t| !t.is_empty()) {
            events.push(StreamEvent::Content {
                choice: choice.index,
                text: text.clone(),
            });
        }

        for tc in choice.delta.tool_calls.iter().flatten() {
            let function = tc.function.as_ref();
            if let Some(id) = &tc.id {
                events.push(StreamEvent::ToolCallStart {
                    choice: choice.index,
                    index: tc.index,
                    id: id.clone(),
                    name: function.and_then(|f| f.name.clone()).unwrap_or_default(),
                });
            }
            if let Some(arguments) = function.and_then(|f| f.arguments.as_ref()).filter(|a| !a.is_empty()) {
                events.push(StreamEvent::ToolCallDelta {
                    choice: choice.index,
                    index: tc.index,
                    arguments: Arguments::Fragment(arguments.clone()),
                });
            }
        }

        if choice.finish_reason.is_some() {
            events.push(StreamEvent::Finish { choice: choice.index });
        }
    }

    if let Some(usage) = &chunk.usage {
        events.push(StreamEvent::Usage(usage.token_usage()));
    }

    events
}

// -- Embeddings --

/// Build an embeddings request for the texts in ascending index order
pub fn build_embedding_request(
    model: String,
    content: &IndexedContent,
    params: &ModelParameters,
    flavor: Flavor,
) -> OpenAiEmbeddingRequest {
    OpenAiEmbeddingRequest {
        model,
        input: ordering::ordered_texts(content),
        dimensions: params.unsigned(keys::DIMENSIONS),
        user: match flavor {
            Flavor::Native => params.string(keys::USER),
            Flavor::Compatible => None,
        },
    }
}

/// Map an embeddings response back to the caller's indices
pub fn parse_embeddings(content: &IndexedContent, response: OpenAiEmbeddingResponse) -> Result<Vec<Embedding>, LlmError> {
    ordering::restore_embeddings(content, response.data.into_iter().map(|d| (d.index, d.embedding)))
}

#[cfg(test)]
mod tests {
    use switchboard_core::ToolResult;

    use super::*;
    use crate::protocol::openai::{OpenAiChoice, OpenAiChoiceMessage};

    fn options(params: ModelParameters, tools: Vec<ToolDefinition>) -> ChatCompletionOptions {
        ChatCompletionOptions {
            model_parameters: params,
            tool_definitions: tools,
            ..ChatCompletionOptions::default()
        }
    }

    #[test]
    fn history_skips_blank_system_and_splits_tool_results() {
        let history = vec![
            Message::system("  "),
            Message::user("weather?"),
            Message::Assistant(AssistantMessage::new(
                vec!["Checking".to_owned(), " now".to_owned()],
                vec![ToolCall::function("call_1", "weather", "{\"city\":\"Oslo\"}")],
            )),
            Message::tool(vec![
                ToolResult {
                    id: "call_1".to_owned(),
                    name: "weather".to_owned(),
                    content: "{\"temp\":3}".to_owned(),
                },
                ToolResult {
                    id: "call_2".to_owned(),
                    name: "time".to_owned(),
                    content: "noon".to_owned(),
                },
            ]),
            Message::Assistant(AssistantMessage::default()),
        ];

        let messages = build_messages(&history);

        let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "assistant", "tool", "tool"]);
        assert_eq!(messages[1].content.as_deref(), Some("Checking now"));
        assert_eq!(messages[1].tool_calls.as_ref().unwrap()[0].id, "call_1");
        assert_eq!(messages[3].tool_call_id.as_deref(), Some("call_2"));
    }

    #[test]
    fn parameters_map_onto_request_fields() {
        let params = ModelParameters::new()
            .with(keys::TEMPERATURE, "0.2")
            .with(keys::MAX_COMPLETION_TOKENS, 256)
            .with(keys::STOP, "END, ,STOP")
            .with(keys::SEED, 7)
            .with(keys::USER, "u-1")
            .with(keys::METADATA, "{\"team\":\"search\"}")
            .with(keys::RESPONSE_FORMAT, json!({"type": "json_object"}));

        let request = build_request("gpt-4o".to_owned(), &[Message::user("hi")], &options(params, vec![]), Flavor::Native, false);

        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.max_tokens, Some(256));
        assert_eq!(request.stop, Some(vec!["END".to_owned(), "STOP".to_owned()]));
        assert_eq!(request.seed, Some(7));
        assert_eq!(request.user.as_deref(), Some("u-1"));
        assert_eq!(request.metadata.unwrap()["team"], "search");
        assert_eq!(request.response_format, Some(json!({"type": "json_object"})));
        assert!(request.stream.is_none());
    }

    #[test]
    fn compatible_flavor_drops_openai_only_parameters() {
        let params = ModelParameters::new()
            .with(keys::USER, "u-1")
            .with(keys::SERVICE_TIER, "flex");

        let request = build_request("mistral-large".to_owned(), &[Message::user("hi")], &options(params, vec![]), Flavor::Compatible, true);

        assert!(request.user.is_none());
        assert!(request.service_tier.is_none());
        assert_eq!(request.stream, Some(true));
        assert!(request.stream_options.is_none());
    }

    #[test]
    fn tool_choice_only_sent_with_tools() {
        let params = ModelParameters::new().with(keys::TOOL_CHOICE, "required");
        let without = build_request("m".to_owned(), &[Message::user("hi")], &options(params.clone(), vec![]), Flavor::Native, false);
        assert!(without.tool_choice.is_none());
        assert!(without.tools.is_none());

        let tools = vec![ToolDefinition::function("lookup", None, None)];
        let with = build_request("m".to_owned(), &[Message::user("hi")], &options(params, tools.clone()), Flavor::Native, false);
        assert_eq!(with.tool_choice.as_deref(), Some("required"));
        assert_eq!(with.tools.unwrap()[0].function.parameters, json!({"type": "object", "properties": {}}));

        let odd = ModelParameters::new().with(keys::TOOL_CHOICE, "sometimes");
        let fallback = build_request("m".to_owned(), &[Message::user("hi")], &options(odd, tools), Flavor::Native, false);
        assert_eq!(fallback.tool_choice.as_deref(), Some("none"));
    }

    #[test]
    fn response_choices_are_filtered_by_finish_reason() {
        let response = OpenAiResponse {
            id: "r".to_owned(),
            model: "m".to_owned(),
            choices: vec![
                OpenAiChoice {
                    index: 0,
                    message: OpenAiChoiceMessage {
                        content: Some("hello".to_owned()),
                        tool_calls: None,
                    },
                    finish_reason: Some("stop".to_owned()),
                },
                OpenAiChoice {
                    index: 1,
                    message: OpenAiChoiceMessage {
                        content: Some("cut of".to_owned()),
                        tool_calls: None,
                    },
                    finish_reason: Some("length".to_owned()),
                },
            ],
            usage: None,
        };

        let message = parse_response(response);
        assert_eq!(message.contents, vec!["hello".to_owned()]);
        assert!(message.tool_calls.is_empty());
    }

    #[test]
    fn stream_frames_translate_to_events() {
        let start = r#"{"id":"c","choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"lookup","arguments":""}}]}}]}"#;
        let args = r#"{"id":"c","choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"q\":1}"}}]}}]}"#;
        let finish = r#"{"id":"c","choices":[{"index":0,"delta":{},"finish_reason":"tool_calls"}]}"#;

        assert_eq!(
            frame_events(start).unwrap(),
            vec![StreamEvent::ToolCallStart {
                choice: 0,
                index: 0,
                id: "call_1".to_owned(),
                name: "lookup".to_owned(),
            }]
        );
        assert_eq!(
            frame_events(args).unwrap(),
            vec![StreamEvent::ToolCallDelta {
                choice: 0,
                index: 0,
                arguments: Arguments::Fragment("{\"q\":1}".to_owned()),
            }]
        );
        assert_eq!(frame_events(finish).unwrap(), vec![StreamEvent::Finish { choice: 0 }]);
        assert_eq!(frame_events("[DONE]").unwrap(), vec![StreamEvent::Done]);
        assert!(frame_events("not json").unwrap().is_empty());
    }

    #[test]
    fn stream_error_frame_aborts() {
        let err = frame_events(r#"{"error":{"message":"overloaded"}}"#).unwrap_err();
        assert!(matches!(err, LlmError::Streaming(m) if m == "overloaded"));
    }

    #[test]
    fn usage_includes_cache_and_reasoning_details() {
        let usage: OpenAiUsage = serde_json::from_value(json!({
            "prompt_tokens": 10,
            "completion_tokens": 5,
            "total_tokens": 15,
            "prompt_tokens_details": {"cached_tokens": 4},
            "completion_tokens_details": {"reasoning_tokens": 2}
        }))
        .unwrap();

        let tokens = usage.token_usage();
        assert_eq!(tokens.input, Some(10));
        assert_eq!(tokens.total, Some(15));
        assert_eq!(tokens.cached_input, Some(4));
        assert_eq!(tokens.reasoning, Some(2));
    }
}
