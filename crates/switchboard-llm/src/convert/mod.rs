//! Conversion between the canonical message model and vendor wire formats
//!
//! Each submodule handles one API family: request building from a history
//! and model parameters, response parsing, and translation of native stream
//! frames into [`crate::stream::StreamEvent`]s.

pub mod anthropic;
pub mod cohere;
pub mod google;
pub mod openai;
pub mod replicate;

use serde_json::{Value, json};
use switchboard_core::{AssistantMessage, Message, ToolCall};

use crate::error::LlmError;

/// Reject an empty conversation before anything is sent
pub fn ensure_history(history: &[Message]) -> Result<(), LlmError> {
    if history.is_empty() {
        return Err(LlmError::InvalidRequest("no messages in the input".to_owned()));
    }
    Ok(())
}

/// Normalised reason a unary choice stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
}

impl FinishReason {
    /// Map a vendor finish reason; unknown or absent reasons read as `Stop`
    pub fn parse(reason: Option<&str>) -> Self {
        match reason.map(str::to_ascii_lowercase).as_deref() {
            Some("length" | "max_tokens" | "max_output_tokens") => Self::Length,
            Some("content_filter" | "refusal" | "safety" | "recitation" | "blocklist" | "prohibited_content" | "spii") => {
                Self::ContentFilter
            }
            Some("tool_calls" | "function_call" | "tool_use" | "tool_call") => Self::ToolCalls,
            _ => Self::Stop,
        }
    }
}

/// One parsed unary choice before finish-reason filtering
#[derive(Debug, Default)]
pub struct ChoiceOutput {
    pub finish: Option<String>,
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

/// Fold unary choices into one assistant message
///
/// Stopped choices contribute their text and any tool calls, tool-call
/// choices contribute only their tool calls, and truncated or filtered
/// choices contribute nothing.
pub fn assemble(choices: impl IntoIterator<Item = ChoiceOutput>) -> AssistantMessage {
    let mut contents = Vec::new();
    let mut tool_calls = Vec::new();

    for choice in choices {
        match FinishReason::parse(choice.finish.as_deref()) {
            FinishReason::Stop => {
                contents.extend(choice.text);
                tool_calls.extend(choice.tool_calls);
            }
            FinishReason::ToolCalls => tool_calls.extend(choice.tool_calls),
            FinishReason::Length | FinishReason::ContentFilter => {
                tracing::debug!(finish = ?choice.finish, "dropping truncated choice");
            }
        }
    }

    AssistantMessage::new(contents, tool_calls)
}

/// Tool call arguments as a JSON object
///
/// Vendors that take arguments as an object reject malformed text, so
/// anything that does not parse is sent as `{}`.
pub fn arguments_object(arguments: &str) -> Value {
    if arguments.trim().is_empty() {
        return json!({});
    }
    serde_json::from_str(arguments).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "tool call arguments are not valid JSON, sending empty object");
        json!({})
    })
}

/// Tool result content as JSON, wrapping plain text as `{"content": ...}`
pub fn tool_result_value(content: &str) -> Value {
    match serde_json::from_str::<Value>(content) {
        Ok(value @ Value::Object(_)) => value,
        _ => json!({ "content": content }),
    }
}

/// Re-serialise an argument object to the canonical string form
pub fn arguments_string(value: &Value) -> String {
    if value.is_null() {
        return "{}".to_owned();
    }
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_owned())
}

/// Joined text of a system message, or `None` when it is blank
pub(crate) fn system_text(content: &str) -> Option<String> {
    if content.trim().is_empty() { None } else { Some(content.to_owned()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_history_is_rejected() {
        let err = ensure_history(&[]).unwrap_err();
        assert_eq!(err.to_string(), "invalid request: no messages in the input");
        assert!(ensure_history(&[Message::user("hi")]).is_ok());
    }

    #[test]
    fn finish_reasons_normalise_across_vendors() {
        assert_eq!(FinishReason::parse(Some("MAX_TOKENS")), FinishReason::Length);
        assert_eq!(FinishReason::parse(Some("SAFETY")), FinishReason::ContentFilter);
        assert_eq!(FinishReason::parse(Some("tool_use")), FinishReason::ToolCalls);
        assert_eq!(FinishReason::parse(Some("TOOL_CALL")), FinishReason::ToolCalls);
        assert_eq!(FinishReason::parse(Some("end_turn")), FinishReason::Stop);
        assert_eq!(FinishReason::parse(None), FinishReason::Stop);
    }

    #[test]
    fn assemble_filters_by_finish_reason() {
        let message = assemble(vec![
            ChoiceOutput {
                finish: Some("stop".to_owned()),
                text: Some("kept".to_owned()),
                tool_calls: vec![],
            },
            ChoiceOutput {
                finish: Some("length".to_owned()),
                text: Some("truncated".to_owned()),
                tool_calls: vec![],
            },
            ChoiceOutput {
                finish: Some("tool_calls".to_owned()),
                text: Some("thinking aloud".to_owned()),
                tool_calls: vec![ToolCall::function("c1", "lookup", "{}")],
            },
        ]);

        assert_eq!(message.contents, vec!["kept".to_owned()]);
        assert_eq!(message.tool_calls.len(), 1);
    }

    #[test]
    fn malformed_arguments_become_empty_object() {
        assert_eq!(arguments_object("{\"a\":1}"), json!({"a": 1}));
        assert_eq!(arguments_object("{not json"), json!({}));
        assert_eq!(arguments_object(""), json!({}));
    }

    #[test]
    fn plain_tool_results_are_wrapped() {
        assert_eq!(tool_result_value("{\"temp\":21}"), json!({"temp": 21}));
        assert_eq!(tool_result_value("sunny"), json!({"content": "sunny"}));
        assert_eq!(tool_result_value("[1,2]"), json!({"content": "[1,2]"}));
    }
}
