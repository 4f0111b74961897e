//! Conversion between the canonical model and the Anthropic Messages format

use std::collections::HashMap;

use switchboard_core::params::keys;
use switchboard_core::{AssistantMessage, ChatCompletionOptions, Message, ModelParameters, TokenUsage, ToolCall, UsageMetrics};

use super::{ChoiceOutput, arguments_object, arguments_string, assemble};
use crate::error::LlmError;
use crate::protocol::anthropic::{
    AnthropicContentBlock, AnthropicMessage, AnthropicRequest, AnthropicResponse, AnthropicResponseBlock,
    AnthropicStreamContentBlock, AnthropicStreamDelta, AnthropicStreamEvent, AnthropicThinking, AnthropicTool,
    AnthropicToolChoice, AnthropicUsage,
};
use crate::stream::{Arguments, StreamEvent};

/// Used when `model.max_tokens` is absent; Anthropic requires the field
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Thinking budget when `model.thinking` enables thinking without one
const DEFAULT_THINKING_BUDGET: u32 = 1024;

// -- Outbound: canonical history -> Anthropic wire request --

/// Split a canonical history into the system prompt and the turn list
///
/// System messages are joined into the top-level `system` field. Tool
/// results are sent back as `tool_result` blocks in a user turn.
pub fn build_messages(history: &[Message]) -> (Option<String>, Vec<AnthropicMessage>) {
    let mut system: Vec<String> = Vec::new();
    let mut messages = Vec::with_capacity(history.len());

    for message in history {
        match message {
            Message::System(m) => system.extend(super::system_text(&m.content)),
            Message::User(m) => messages.push(AnthropicMessage {
                role: "user".to_owned(),
                content: vec![AnthropicContentBlock::Text { text: m.content.clone() }],
            }),
            Message::Assistant(m) => {
                if m.is_empty() {
                    continue;
                }
                let mut blocks = Vec::with_capacity(m.tool_calls.len() + 1);
                let text = m.text();
                if !text.is_empty() {
                    blocks.push(AnthropicContentBlock::Text { text });
                }
                blocks.extend(m.tool_calls.iter().map(|tc| AnthropicContentBlock::ToolUse {
                    id: tc.id.clone(),
                    name: tc.function.name.clone(),
                    input: arguments_object(&tc.function.arguments),
                }));
                messages.push(AnthropicMessage {
                    role: "assistant".to_owned(),
                    content: blocks,
                });
            }
            Message::Tool(m) => messages.push(AnthropicMessage {
                role: "user".to_owned(),
                content: m
                    .tools
                    .iter()
                    .map(|result| AnthropicContentBlock::ToolResult {
                        tool_use_id: result.id.clone(),
                        content: result.content.clone(),
                    })
                    .collect(),
            }),
        }
    }

    let system = if system.is_empty() { None } else { Some(system.join("\n\n")) };
    (system, messages)
}

/// Build a Messages API request
pub fn build_request(model: String, history: &[Message], options: &ChatCompletionOptions, stream: bool) -> AnthropicRequest {
    let params = &options.model_parameters;
    let (system, messages) = build_messages(history);

    let tools: Option<Vec<AnthropicTool>> = if options.tool_definitions.is_empty() {
        None
    } else {
        Some(
            options
                .tool_definitions
                .iter()
                .map(|t| AnthropicTool {
                    name: t.function.name.clone(),
                    description: t.function.description.clone(),
                    input_schema: t.function.parameters_or_empty(),
                })
                .collect(),
        )
    };
    let tool_choice = tools.as_ref().and_then(|_| parse_tool_choice(params));
    let stop = params.string_list(keys::STOP);

    AnthropicRequest {
        model,
        messages,
        max_tokens: params.unsigned(keys::MAX_TOKENS).unwrap_or(DEFAULT_MAX_TOKENS),
        system,
        temperature: params.float(keys::TEMPERATURE),
        top_p: params.float(keys::TOP_P),
        top_k: params.unsigned(keys::TOP_K),
        stop_sequences: if stop.is_empty() { None } else { Some(stop) },
        thinking: thinking(params),
        stream: stream.then_some(true),
        tools,
        tool_choice,
    }
}

/// `auto`, `any` or `none`; `required` reads as `any`
fn parse_tool_choice(params: &ModelParameters) -> Option<AnthropicToolChoice> {
    let choice = params.string(keys::TOOL_CHOICE)?;
    let choice_type = match choice.as_str() {
        "auto" | "any" | "none" => choice,
        "required" => "any".to_owned(),
        other => {
            tracing::debug!(tool_choice = other, "unknown tool choice, disabling tools");
            "none".to_owned()
        }
    };
    Some(AnthropicToolChoice { choice_type })
}

/// `{enabled, budget_tokens}` from the `model.thinking` object
fn thinking(params: &ModelParameters) -> Option<AnthropicThinking> {
    let config = params.object(keys::THINKING)?;
    let enabled = config.get("enabled").and_then(serde_json::Value::as_bool).unwrap_or(false);
    if !enabled {
        return None;
    }
    let budget_tokens = config
        .get("budget_tokens")
        .and_then(serde_json::Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(DEFAULT_THINKING_BUDGET);
    Some(AnthropicThinking {
        thinking_type: "enabled".to_owned(),
        budget_tokens,
    })
}

// -- Inbound: Anthropic wire response -> canonical message --

/// Parse a unary response into the assistant message
pub fn parse_response(response: AnthropicResponse) -> AssistantMessage {
    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for block in response.content {
        match block {
            AnthropicResponseBlock::Text { text: t } => text.push_str(&t),
            AnthropicResponseBlock::ToolUse { id, name, input } => {
                tool_calls.push(ToolCall::function(id, name, arguments_string(&input)));
            }
            AnthropicResponseBlock::Other => {}
        }
    }

    assemble([ChoiceOutput {
        finish: response.stop_reason,
        text: Some(text),
        tool_calls,
    }])
}

impl UsageMetrics for AnthropicUsage {
    fn token_usage(&self) -> TokenUsage {
        TokenUsage {
            input: self.input_tokens,
            output: self.output_tokens,
            cached_input: self.cache_read_input_tokens,
            cache_creation_input: self.cache_creation_input_tokens,
            ..TokenUsage::default()
        }
    }
}

// -- Stream conversion --

/// State for translating one Anthropic event stream
///
/// Content block indices are shared by text and `tool_use` blocks, so they
/// cannot serve as tool call indices: a tool use after a text block would
/// otherwise start at index 1. Tool blocks get their own sequential index.
#[derive(Debug, Default)]
pub struct AnthropicStreamState {
    /// Content block index -> tool call index
    tool_blocks: HashMap<u32, u32>,
    next_tool_index: u32,
}

impl AnthropicStreamState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Translate one SSE `data:` payload; unparseable payloads are skipped
    pub fn frame_events(&mut self, data: &str) -> Result<Vec<StreamEvent>, LlmError> {
        match serde_json::from_str::<AnthropicStreamEvent>(data) {
            Ok(event) => self.convert_event(event),
            Err(e) => {
                tracing::debug!(error = %e, data = %data, "skipping unparseable SSE event");
                Ok(Vec::new())
            }
        }
    }

    pub fn convert_event(&mut self, event: AnthropicStreamEvent) -> Result<Vec<StreamEvent>, LlmError> {
        let events = match event {
            AnthropicStreamEvent::MessageStart { message } => {
                message.usage.map(|u| StreamEvent::Usage(u.token_usage())).into_iter().collect()
            }
            AnthropicStreamEvent::ContentBlockStart { index, content_block } => match content_block {
                AnthropicStreamContentBlock::Text { text } if !text.is_empty() => {
                    vec![StreamEvent::Content { choice: 0, text }]
                }
                AnthropicStreamContentBlock::ToolUse { id, name } => {
                    let tool_index = self.next_tool_index;
                    self.next_tool_index += 1;
                    self.tool_blocks.insert(index, tool_index);
                    vec![StreamEvent::ToolCallStart {
                        choice: 0,
                        index: tool_index,
                        id,
                        name,
                    }]
                }
                AnthropicStreamContentBlock::Text { .. } | AnthropicStreamContentBlock::Other => Vec::new(),
            },
            AnthropicStreamEvent::ContentBlockDelta { index, delta } => match delta {
                AnthropicStreamDelta::TextDelta { text } => vec![StreamEvent::Content { choice: 0, text }],
                AnthropicStreamDelta::InputJsonDelta { partial_json } => match self.tool_blocks.get(&index) {
                    Some(&tool_index) => vec![StreamEvent::ToolCallDelta {
                        choice: 0,
                        index: tool_index,
                        arguments: Arguments::Fragment(partial_json),
                    }],
                    None => {
                        tracing::debug!(index, "input delta for unknown block");
                        Vec::new()
                    }
                },
                AnthropicStreamDelta::Other => Vec::new(),
            },
            AnthropicStreamEvent::ContentBlockStop { index } => match self.tool_blocks.get(&index) {
                Some(&tool_index) => vec![StreamEvent::ToolCallStop {
                    choice: 0,
                    index: tool_index,
                }],
                None => vec![StreamEvent::ContentStop { choice: 0 }],
            },
            AnthropicStreamEvent::MessageDelta { usage } => {
                usage.map(|u| StreamEvent::Usage(u.token_usage())).into_iter().collect()
            }
            AnthropicStreamEvent::MessageStop => vec![StreamEvent::Finish { choice: 0 }, StreamEvent::Done],
            AnthropicStreamEvent::Ping => Vec::new(),
            AnthropicStreamEvent::Error { error } => {
                return Err(LlmError::Streaming(format!("{}: {}", error.error_type, error.message)));
            }
        };
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use switchboard_core::ToolResult;

    use super::*;
    use crate::stream::StreamAccumulator;

    #[test]
    fn system_messages_move_to_top_level_field() {
        let history = vec![
            Message::system("Be brief."),
            Message::system(""),
            Message::user("hi"),
            Message::Assistant(AssistantMessage::new(
                vec![],
                vec![ToolCall::function("toolu_1", "lookup", "not json")],
            )),
            Message::tool(vec![ToolResult {
                id: "toolu_1".to_owned(),
                name: "lookup".to_owned(),
                content: "42".to_owned(),
            }]),
        ];

        let (system, messages) = build_messages(&history);

        assert_eq!(system.as_deref(), Some("Be brief."));
        assert_eq!(messages.len(), 3);
        assert_eq!(
            messages[1].content,
            vec![AnthropicContentBlock::ToolUse {
                id: "toolu_1".to_owned(),
                name: "lookup".to_owned(),
                input: json!({}),
            }]
        );
        assert_eq!(messages[2].role, "user");
        assert!(matches!(&messages[2].content[0], AnthropicContentBlock::ToolResult { tool_use_id, .. } if tool_use_id == "toolu_1"));
    }

    #[test]
    fn max_tokens_defaults_and_thinking_maps() {
        let options = ChatCompletionOptions {
            model_parameters: ModelParameters::new()
                .with(keys::TOP_K, 40)
                .with(keys::THINKING, json!({"enabled": true, "budget_tokens": 2048})),
            ..ChatCompletionOptions::default()
        };

        let request = build_request("claude".to_owned(), &[Message::user("hi")], &options, true);

        assert_eq!(request.max_tokens, 1024);
        assert_eq!(request.top_k, Some(40));
        assert_eq!(request.thinking.unwrap().budget_tokens, 2048);
        assert_eq!(request.stream, Some(true));
        assert!(request.tool_choice.is_none());
    }

    #[test]
    fn response_blocks_become_text_and_tool_calls() {
        let response: AnthropicResponse = serde_json::from_value(json!({
            "id": "msg_1",
            "model": "claude",
            "content": [
                {"type": "thinking", "thinking": "hmm"},
                {"type": "text", "text": "Sure."},
                {"type": "tool_use", "id": "toolu_1", "name": "lookup", "input": {"q": "x"}}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 12, "output_tokens": 3, "cache_read_input_tokens": 8}
        }))
        .unwrap();

        let usage = response.usage.clone().unwrap().token_usage();
        let message = parse_response(response);

        assert_eq!(message.text(), "Sure.");
        assert_eq!(message.tool_calls[0].function.arguments, r#"{"q":"x"}"#);
        assert_eq!(usage.cached_input, Some(8));
    }

    #[test]
    fn tool_after_text_gets_its_own_index() {
        let frames = [
            r#"{"type":"message_start","message":{"id":"m","usage":{"input_tokens":10}}}"#,
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Let me check."}}"#,
            r#"{"type":"content_block_stop","index":0}"#,
            r#"{"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"toolu_1","name":"lookup","input":{}}}"#,
            r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"q\":"}}"#,
            r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"1}"}}"#,
            r#"{"type":"content_block_stop","index":1}"#,
            r#"{"type":"message_delta","delta":{"stop_reason":"tool_use"},"usage":{"output_tokens":7}}"#,
            r#"{"type":"message_stop"}"#,
        ];

        let mut state = AnthropicStreamState::new();
        let mut accumulator = StreamAccumulator::new(std::time::Instant::now());
        for frame in frames {
            for event in state.frame_events(frame).unwrap() {
                accumulator.apply(event);
            }
        }

        assert!(accumulator.is_done());
        let outcome = accumulator.finish();
        assert!(outcome.tokens.is_empty());
        assert_eq!(outcome.message.tool_calls.len(), 1);
        assert_eq!(outcome.message.tool_calls[0].function.arguments, r#"{"q":1}"#);
        assert_eq!(outcome.usage.input, Some(10));
        assert_eq!(outcome.usage.output, Some(7));
    }

    #[test]
    fn error_event_aborts_stream() {
        let mut state = AnthropicStreamState::new();
        let err = state
            .frame_events(r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("Overloaded"));
    }
}
