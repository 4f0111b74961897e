//! Conversion between the canonical model and the Cohere v2 format

use serde_json::Value;
use switchboard_core::params::keys;
use switchboard_core::{
    AssistantMessage, ChatCompletionOptions, Embedding, IndexedContent, Message, ModelParameters, Reranking,
    TokenUsage, ToolCall, UsageMetrics,
};

use super::{ChoiceOutput, assemble};
use crate::error::LlmError;
use crate::ordering;
use crate::protocol::cohere::{
    CohereBilledUnits, CohereChatRequest, CohereChatResponse, CohereEmbedRequest, CohereEmbedResponse, CohereFunction,
    CohereFunctionCall, CohereMessage, CohereMeta, CohereRerankRequest, CohereRerankResponse, CohereResponseFormat,
    CohereStreamEvent, CohereTool, CohereToolCall, CohereUsage,
};
use crate::stream::{Arguments, StreamEvent};

/// Embedding input type when `model.input_type` is absent
const DEFAULT_INPUT_TYPE: &str = "search_document";

// -- Outbound: canonical history -> Cohere wire request --

/// Build the vendor message list from a canonical history
pub fn build_messages(history: &[Message]) -> Vec<CohereMessage> {
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
                let tool_calls: Vec<CohereToolCall> = m
                    .tool_calls
                    .iter()
                    .map(|tc| CohereToolCall {
                        id: tc.id.clone(),
                        tool_type: "function".to_owned(),
                        function: CohereFunctionCall {
                            name: tc.function.name.clone(),
                            arguments: tc.function.arguments.clone(),
                        },
                    })
                    .collect();
                messages.push(CohereMessage {
                    role: "assistant".to_owned(),
                    content: if text.is_empty() { None } else { Some(text) },
                    tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
                    tool_call_id: None,
                });
            }
            Message::Tool(m) => messages.extend(m.tools.iter().map(|result| CohereMessage {
                role: "tool".to_owned(),
                content: Some(result.content.clone()),
                tool_calls: None,
                tool_call_id: Some(result.id.clone()),
            })),
        }
    }

    messages
}

fn text_message(role: &str, content: String) -> CohereMessage {
    CohereMessage {
        role: role.to_owned(),
        content: Some(content),
        tool_calls: None,
        tool_call_id: None,
    }
}

/// Build a v2 chat request
pub fn build_request(model: String, history: &[Message], options: &ChatCompletionOptions, stream: bool) -> CohereChatRequest {
    let params = &options.model_parameters;
    let tools: Option<Vec<CohereTool>> = if options.tool_definitions.is_empty() {
        None
    } else {
        Some(
            options
                .tool_definitions
                .iter()
                .map(|t| CohereTool {
                    tool_type: "function".to_owned(),
                    function: CohereFunction {
                        name: t.function.name.clone(),
                        description: t.function.description.clone(),
                        parameters: t.function.parameters_or_empty(),
                    },
                })
                .collect(),
        )
    };
    let tool_choice = tools.as_ref().and_then(|_| parse_tool_choice(params));
    let stop = params.string_list(keys::STOP);

    CohereChatRequest {
        model,
        messages: build_messages(history),
        tools,
        stream: stream.then_some(true),
        max_tokens: params
            .unsigned(keys::MAX_COMPLETION_TOKENS)
            .or_else(|| params.unsigned(keys::MAX_TOKENS)),
        temperature: params.float(keys::TEMPERATURE),
        p: params.float(keys::TOP_P),
        k: params.unsigned(keys::TOP_K),
        frequency_penalty: params.float(keys::FREQUENCY_PENALTY),
        presence_penalty: params.float(keys::PRESENCE_PENALTY),
        stop_sequences: if stop.is_empty() { None } else { Some(stop) },
        seed: params.integer(keys::SEED),
        response_format: response_format(params),
        tool_choice,
    }
}

/// `REQUIRED` or `NONE`; `auto` is the vendor default and is not sent
fn parse_tool_choice(params: &ModelParameters) -> Option<String> {
    let choice = params.string(keys::TOOL_CHOICE)?;
    match choice.to_ascii_lowercase().as_str() {
        "auto" => None,
        "required" | "any" => Some("REQUIRED".to_owned()),
        "none" => Some("NONE".to_owned()),
        other => {
            tracing::debug!(tool_choice = other, "unknown tool choice, disabling tools");
            Some("NONE".to_owned())
        }
    }
}

fn response_format(params: &ModelParameters) -> Option<CohereResponseFormat> {
    let format = params.object(keys::RESPONSE_FORMAT)?;
    let format_type = format.get("type").and_then(Value::as_str)?;
    match format_type {
        "text" => Some(CohereResponseFormat {
            format_type: "text".to_owned(),
            json_schema: None,
        }),
        "json_object" | "json_schema" => Some(CohereResponseFormat {
            format_type: "json_object".to_owned(),
            json_schema: format.get("json_schema").cloned(),
        }),
        other => {
            tracing::debug!(response_format = other, "ignoring unknown response format");
            None
        }
    }
}

// -- Inbound: Cohere wire response -> canonical message --

/// Cohere finish reasons in the shared vocabulary
fn finish_reason(reason: Option<String>) -> Option<String> {
    reason.map(|r| match r.as_str() {
        "COMPLETE" | "STOP_SEQUENCE" => "stop".to_owned(),
        "MAX_TOKENS" => "length".to_owned(),
        "TOOL_CALL" => "tool_calls".to_owned(),
        "ERROR" | "ERROR_TOXIC" => "content_filter".to_owned(),
        _ => r,
    })
}

/// Parse a unary response into the assistant message
pub fn parse_response(response: CohereChatResponse) -> AssistantMessage {
    let text: String = response
        .message
        .content
        .into_iter()
        .filter(|block| block.block_type == "text")
        .filter_map(|block| block.text)
        .collect();

    let tool_calls = response
        .message
        .tool_calls
        .into_iter()
        .map(|tc| ToolCall::function(tc.id, tc.function.name, tc.function.arguments))
        .collect();

    assemble([ChoiceOutput {
        finish: finish_reason(response.finish_reason),
        text: Some(text),
        tool_calls,
    }])
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn count(value: Option<f64>) -> Option<u64> {
    value.map(|v| v.max(0.0) as u64)
}

fn billed(usage: &mut TokenUsage, units: Option<&CohereBilledUnits>) {
    if let Some(units) = units {
        usage.billed_input = count(units.input_tokens);
        usage.billed_output = count(units.output_tokens);
        usage.billed_search = count(units.search_units);
    }
}

impl UsageMetrics for CohereUsage {
    fn token_usage(&self) -> TokenUsage {
        let mut usage = TokenUsage::default();
        if let Some(tokens) = &self.tokens {
            usage.input = count(tokens.input_tokens);
            usage.output = count(tokens.output_tokens);
        }
        billed(&mut usage, self.billed_units.as_ref());
        usage
    }
}

impl UsageMetrics for CohereMeta {
    fn token_usage(&self) -> TokenUsage {
        let mut usage = TokenUsage::default();
        billed(&mut usage, self.billed_units.as_ref());
        usage.input = usage.billed_input;
        usage
    }
}

// -- Stream conversion --

/// Translate one SSE `data:` payload into canonical events
///
/// Cohere streams a single choice. `message-end` carries the usage and
/// ends the stream.
pub fn frame_events(data: &str) -> Result<Vec<StreamEvent>, LlmError> {
    let event = match serde_json::from_str::<CohereStreamEvent>(data) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!(error = %e, data = %data, "skipping unparseable SSE event");
            return Ok(Vec::new());
        }
    };

    let events = match event {
        CohereStreamEvent::ContentDelta { delta, .. } => delta
            .message
            .and_then(|m| m.content)
            .and_then(|c| c.text)
            .filter(|t| !t.is_empty())
            .map(|text| StreamEvent::Content { choice: 0, text })
            .into_iter()
            .collect(),
        CohereStreamEvent::ContentEnd { .. } => vec![StreamEvent::ContentStop { choice: 0 }],
        CohereStreamEvent::ToolCallStart { index, delta } => {
            let call = delta.message.and_then(|m| m.tool_calls).unwrap_or_default();
            let function = call.function.unwrap_or_default();
            let mut events = vec![StreamEvent::ToolCallStart {
                choice: 0,
                index,
                id: call.id.unwrap_or_default(),
                name: function.name.unwrap_or_default(),
            }];
            if let Some(arguments) = function.arguments.filter(|a| !a.is_empty()) {
                events.push(StreamEvent::ToolCallDelta {
                    choice: 0,
                    index,
                    arguments: Arguments::Fragment(arguments),
                });
            }
            events
        }
        CohereStreamEvent::ToolCallDelta { index, delta } => delta
            .message
            .and_then(|m| m.tool_calls)
            .and_then(|c| c.function)
            .and_then(|f| f.arguments)
            .filter(|a| !a.is_empty())
            .map(|arguments| StreamEvent::ToolCallDelta {
                choice: 0,
                index,
                arguments: Arguments::Fragment(arguments),
            })
            .into_iter()
            .collect(),
        CohereStreamEvent::ToolCallEnd { index } => vec![StreamEvent::ToolCallStop { choice: 0, index }],
        CohereStreamEvent::MessageEnd { delta } => {
            if matches!(delta.finish_reason.as_deref(), Some("ERROR" | "ERROR_TOXIC")) {
                return Err(LlmError::Streaming("vendor ended the stream with an error".to_owned()));
            }
            let mut events = Vec::with_capacity(3);
            if let Some(usage) = delta.usage {
                events.push(StreamEvent::Usage(usage.token_usage()));
            }
            events.push(StreamEvent::Finish { choice: 0 });
            events.push(StreamEvent::Done);
            events
        }
        CohereStreamEvent::MessageStart
        | CohereStreamEvent::ContentStart { .. }
        | CohereStreamEvent::ToolPlanDelta
        | CohereStreamEvent::Other => Vec::new(),
    };

    Ok(events)
}

// -- Embeddings and reranking --

/// Build an embed request for the texts in ascending index order
pub fn build_embed_request(model: String, content: &IndexedContent, params: &ModelParameters) -> CohereEmbedRequest {
    CohereEmbedRequest {
        model,
        texts: ordering::ordered_texts(content),
        input_type: params
            .string(keys::INPUT_TYPE)
            .unwrap_or_else(|| DEFAULT_INPUT_TYPE.to_owned()),
        embedding_types: vec!["float".to_owned()],
    }
}

/// Float vectors come back in request order
pub fn parse_embeddings(content: &IndexedContent, response: CohereEmbedResponse) -> Result<Vec<Embedding>, LlmError> {
    ordering::restore_embeddings(content, response.embeddings.float.into_iter().enumerate())
}

pub fn build_rerank_request(
    model: String,
    query: &str,
    documents: &IndexedContent,
    params: &ModelParameters,
) -> CohereRerankRequest {
    CohereRerankRequest {
        model,
        query: query.to_owned(),
        documents: ordering::ordered_texts(documents),
        top_n: params.unsigned(keys::TOP_N),
    }
}

/// Map ranked results back to the caller's document indices
pub fn parse_rerankings(documents: &IndexedContent, response: CohereRerankResponse) -> Result<Vec<Reranking>, LlmError> {
    ordering::restore_rerankings(documents, response.results.into_iter().map(|r| (r.index, r.relevance_score)))
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use switchboard_core::ToolDefinition;

    use super::*;
    use crate::stream::StreamAccumulator;

    #[test]
    fn request_maps_sampling_names() {
        let options = ChatCompletionOptions {
            model_parameters: ModelParameters::new()
                .with(keys::TOP_P, 0.9)
                .with(keys::TOP_K, 20)
                .with(keys::MAX_TOKENS, 300)
                .with(keys::TOOL_CHOICE, "auto")
                .with(keys::RESPONSE_FORMAT, r#"{"type":"json_object"}"#),
            tool_definitions: vec![ToolDefinition::function("lookup", None, None)],
            ..ChatCompletionOptions::default()
        };

        let request = build_request("command-r".to_owned(), &[Message::user("hi")], &options, false);

        assert_eq!(request.p, Some(0.9));
        assert_eq!(request.k, Some(20));
        assert_eq!(request.max_tokens, Some(300));
        assert!(request.tool_choice.is_none());
        assert_eq!(request.response_format.unwrap().format_type, "json_object");
    }

    #[test]
    fn tool_call_response_drops_tool_plan_text() {
        let response: CohereChatResponse = serde_json::from_value(json!({
            "id": "r",
            "finish_reason": "TOOL_CALL",
            "message": {
                "role": "assistant",
                "content": [{"type": "text", "text": "I will look it up"}],
                "tool_calls": [{"id": "tc_1", "type": "function", "function": {"name": "lookup", "arguments": "{}"}}]
            },
            "usage": {"billed_units": {"input_tokens": 9, "output_tokens": 4}, "tokens": {"input_tokens": 120, "output_tokens": 4}}
        }))
        .unwrap();

        let usage = response.usage.clone().unwrap().token_usage();
        let message = parse_response(response);

        assert!(message.contents.is_empty());
        assert_eq!(message.tool_calls[0].id, "tc_1");
        assert_eq!(usage.input, Some(120));
        assert_eq!(usage.billed_input, Some(9));
    }

    #[test]
    fn stream_events_fold_into_tool_call() {
        let frames = [
            r#"{"type":"message-start","id":"m","delta":{"message":{"role":"assistant"}}}"#,
            r#"{"type":"tool-plan-delta","delta":{"message":{"tool_plan":"I will"}}}"#,
            r#"{"type":"tool-call-start","index":0,"delta":{"message":{"tool_calls":{"id":"tc_1","type":"function","function":{"name":"lookup","arguments":""}}}}}"#,
            r#"{"type":"tool-call-delta","index":0,"delta":{"message":{"tool_calls":{"function":{"arguments":"{\"q\":"}}}}}"#,
            r#"{"type":"tool-call-delta","index":0,"delta":{"message":{"tool_calls":{"function":{"arguments":"2}"}}}}}"#,
            r#"{"type":"tool-call-end","index":0}"#,
            r#"{"type":"message-end","delta":{"finish_reason":"TOOL_CALL","usage":{"tokens":{"input_tokens":10,"output_tokens":3}}}}"#,
        ];

        let mut accumulator = StreamAccumulator::new(std::time::Instant::now());
        for frame in frames {
            for event in frame_events(frame).unwrap() {
                accumulator.apply(event);
            }
        }

        assert!(accumulator.is_done());
        let outcome = accumulator.finish();
        assert!(outcome.tokens.is_empty());
        assert_eq!(outcome.message.tool_calls[0].function.arguments, r#"{"q":2}"#);
        assert_eq!(outcome.usage.output, Some(3));
    }

    #[test]
    fn text_deltas_become_content() {
        let events = frame_events(
            r#"{"type":"content-delta","index":0,"delta":{"message":{"content":{"text":"Hello"}}}}"#,
        )
        .unwrap();
        assert_eq!(events, vec![StreamEvent::Content { choice: 0, text: "Hello".to_owned() }]);
    }

    #[test]
    fn rerank_results_are_sorted_by_caller_index() {
        let documents: IndexedContent = [(0, "a".to_owned()), (5, "b".to_owned()), (9, "c".to_owned())]
            .into_iter()
            .collect();
        let response: CohereRerankResponse = serde_json::from_value(json!({
            "results": [
                {"index": 2, "relevance_score": 0.9},
                {"index": 0, "relevance_score": 0.5},
                {"index": 1, "relevance_score": 0.1}
            ]
        }))
        .unwrap();

        let rerankings = parse_rerankings(&documents, response).unwrap();

        let indices: Vec<u32> = rerankings.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 5, 9]);
        assert_eq!(rerankings[2].content, "c");
        assert!((rerankings[2].relevance_score - 0.9).abs() < f64::EPSILON);
    }
}
