//! Canonical message model shared by every vendor adapter

use serde::{Deserialize, Serialize, Serializer};

/// Conversation participant role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single conversation message
///
/// The payload variant is the role, so a message can never carry a
/// payload that disagrees with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System(SystemMessage),
    User(UserMessage),
    Assistant(AssistantMessage),
    Tool(ToolMessage),
}

impl Message {
    /// Build a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::System(SystemMessage {
            content: content.into(),
        })
    }

    /// Build a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::User(UserMessage {
            content: content.into(),
        })
    }

    /// Build an assistant message holding a single text segment
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant(AssistantMessage::new(vec![content.into()], Vec::new()))
    }

    /// Build a tool message from tool results
    pub fn tool(tools: Vec<ToolResult>) -> Self {
        Self::Tool(ToolMessage { tools })
    }

    pub const fn role(&self) -> Role {
        match self {
            Self::System(_) => Role::System,
            Self::User(_) => Role::User,
            Self::Assistant(_) => Role::Assistant,
            Self::Tool(_) => Role::Tool,
        }
    }

    /// Plain text carried by the message, if any
    ///
    /// Assistant segments are joined without a separator. Tool messages
    /// carry no text of their own.
    pub fn text(&self) -> Option<String> {
        match self {
            Self::System(m) => Some(m.content.clone()),
            Self::User(m) => Some(m.content.clone()),
            Self::Assistant(m) => Some(m.text()),
            Self::Tool(_) => None,
        }
    }

    pub const fn as_assistant(&self) -> Option<&AssistantMessage> {
        match self {
            Self::Assistant(m) => Some(m),
            _ => None,
        }
    }
}

/// Instructions for the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemMessage {
    pub content: String,
}

/// End-user input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMessage {
    pub content: String,
}

/// Model output: ordered text segments and ordered tool calls
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantMessage {
    /// Text segments in the order the vendor produced them
    #[serde(default, skip_serializing_if = "Vec::is_empty", serialize_with = "non_empty_segments")]
    pub contents: Vec<String>,
    /// Tool invocations requested by the model
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl AssistantMessage {
    /// Build an assistant message, dropping empty text segments
    pub fn new(contents: Vec<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            contents: contents.into_iter().filter(|s| !s.is_empty()).collect(),
            tool_calls,
        }
    }

    /// Append a text segment unless it is empty
    pub fn push_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        if !text.is_empty() {
            self.contents.push(text);
        }
    }

    /// All text segments joined without a separator
    pub fn text(&self) -> String {
        self.contents.concat()
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Whether the message has neither text nor tool calls
    pub fn is_empty(&self) -> bool {
        self.contents.iter().all(String::is_empty) && self.tool_calls.is_empty()
    }
}

fn non_empty_segments<S: Serializer>(contents: &[String], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(contents.iter().filter(|s| !s.is_empty()))
}

/// Results of tool invocations fed back to the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolMessage {
    pub tools: Vec<ToolResult>,
}

/// One tool result, correlated to a tool call by id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Vendor-issued tool call identifier this result answers
    pub id: String,
    /// Function name that produced the result
    pub name: String,
    /// Result payload, usually JSON
    pub content: String,
}

/// A tool call requested by the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Opaque vendor-issued identifier
    pub id: String,
    /// Always `function`
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: FunctionCall,
}

impl ToolCall {
    /// Build a function tool call
    pub fn function(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            call_type: "function".to_owned(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// Function invocation inside a tool call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments
    pub arguments: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn role_tag_matches_variant() {
        let message = Message::user("hi");
        assert_eq!(message.role(), Role::User);
        assert_eq!(serde_json::to_value(&message).unwrap(), json!({"role": "user", "content": "hi"}));
    }

    #[test]
    fn empty_segments_never_reach_the_wire() {
        let mut assistant = AssistantMessage {
            contents: vec!["a".to_owned(), String::new(), "b".to_owned()],
            tool_calls: Vec::new(),
        };
        assistant.push_text("");

        let value = serde_json::to_value(Message::Assistant(assistant)).unwrap();
        assert_eq!(value, json!({"role": "assistant", "contents": ["a", "b"]}));
    }

    #[test]
    fn new_assistant_drops_empty_segments() {
        let assistant = AssistantMessage::new(vec![String::new(), "x".to_owned()], Vec::new());
        assert_eq!(assistant.contents, vec!["x".to_owned()]);
        assert!(!assistant.is_empty());
        assert!(AssistantMessage::new(vec![String::new()], Vec::new()).is_empty());
    }

    #[test]
    fn tool_call_serializes_type_field() {
        let call = ToolCall::function("call_1", "lookup", r#"{"q":"x"}"#);
        let value = serde_json::to_value(&call).unwrap();
        assert_eq!(value["type"], "function");
        assert_eq!(value["function"]["name"], "lookup");
    }

    #[test]
    fn tool_message_round_trips() {
        let raw = json!({"role": "tool", "tools": [{"id": "1", "name": "f", "content": "{}"}]});
        let message: Message = serde_json::from_value(raw).unwrap();
        assert_eq!(message.role(), Role::Tool);
        assert!(message.text().is_none());
    }
}
