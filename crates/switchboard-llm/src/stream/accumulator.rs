//! Stateful folding of canonical stream events into a final message

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use switchboard_core::{AssistantMessage, TokenUsage, ToolCall};

use super::{Arguments, StreamEvent};

/// Lifecycle of one choice within a streamed response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChoiceState {
    /// Nothing received yet
    #[default]
    Empty,
    /// Receiving text
    Content,
    /// Receiving a tool call
    ToolCall,
    /// Terminal; later events for the choice are ignored
    Finished,
}

#[derive(Debug, Default)]
struct Choice {
    state: ChoiceState,
    segments: Vec<String>,
    current: String,
}

impl Choice {
    fn close_segment(&mut self) {
        if !self.current.is_empty() {
            self.segments.push(std::mem::take(&mut self.current));
        }
    }
}

#[derive(Debug)]
struct ToolCallBuilder {
    choice: u32,
    index: u32,
    id: String,
    name: String,
    arguments: String,
    complete: bool,
}

/// What a finished stream produced
#[derive(Debug, Clone, PartialEq)]
pub struct StreamOutcome {
    pub message: AssistantMessage,
    /// Text deltas to forward as tokens, in arrival order
    ///
    /// Empty whenever the response contained a tool call.
    pub tokens: Vec<String>,
    pub usage: TokenUsage,
    /// Time from call start to the first text delta
    pub first_token: Option<Duration>,
}

/// Folds the events of one streamed response
///
/// Owned by a single call. Text deltas are buffered rather than forwarded,
/// because a tool call arriving later in the stream means none of the text
/// may be spoken as tokens. Once a tool call has been seen the response is
/// a tool-call response for good.
#[derive(Debug)]
pub struct StreamAccumulator {
    started: Instant,
    choices: BTreeMap<u32, Choice>,
    tool_calls: Vec<ToolCallBuilder>,
    pending: Vec<String>,
    has_tool_calls: bool,
    first_token: Option<Duration>,
    usage: TokenUsage,
    done: bool,
}

impl StreamAccumulator {
    pub fn new(started: Instant) -> Self {
        Self {
            started,
            choices: BTreeMap::new(),
            tool_calls: Vec::new(),
            pending: Vec::new(),
            has_tool_calls: false,
            first_token: None,
            usage: TokenUsage::default(),
            done: false,
        }
    }

    pub const fn has_tool_calls(&self) -> bool {
        self.has_tool_calls
    }

    /// Whether the vendor signalled the end of the response
    pub const fn is_done(&self) -> bool {
        self.done
    }

    pub fn state(&self, choice: u32) -> ChoiceState {
        self.choices.get(&choice).map_or(ChoiceState::Empty, |c| c.state)
    }

    pub fn apply(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Content { choice, text } => self.content(choice, text),
            StreamEvent::ContentStop { choice } => {
                if let Some(c) = self.open_choice(choice) {
                    c.close_segment();
                }
            }
            StreamEvent::ToolCallStart { choice, index, id, name } => self.tool_call_start(choice, index, id, name),
            StreamEvent::ToolCallDelta {
                choice,
                index,
                arguments,
            } => self.tool_call_delta(choice, index, arguments),
            StreamEvent::ToolCallStop { choice, index } => {
                if let Some(builder) = self.open_tool_call(choice, index) {
                    builder.complete = true;
                }
            }
            StreamEvent::Finish { choice } => {
                let c = self.choices.entry(choice).or_default();
                c.close_segment();
                c.state = ChoiceState::Finished;
            }
            StreamEvent::Usage(usage) => self.usage.merge(usage),
            StreamEvent::Done => self.done = true,
        }
    }

    /// Produce the final message and the tokens that may be forwarded
    pub fn finish(mut self) -> StreamOutcome {
        let mut contents = Vec::new();
        for choice in self.choices.values_mut() {
            choice.close_segment();
            contents.append(&mut choice.segments);
        }

        let tool_calls = self
            .tool_calls
            .into_iter()
            .map(|b| {
                let arguments = if b.arguments.trim().is_empty() {
                    "{}".to_owned()
                } else {
                    b.arguments
                };
                ToolCall::function(b.id, b.name, arguments)
            })
            .collect();

        let tokens = if self.has_tool_calls { Vec::new() } else { self.pending };

        StreamOutcome {
            message: AssistantMessage::new(contents, tool_calls),
            tokens,
            usage: self.usage,
            first_token: self.first_token,
        }
    }

    fn content(&mut self, choice: u32, text: String) {
        if text.is_empty() {
            return;
        }

        let Some(c) = self.open_choice(choice) else {
            return;
        };
        c.state = ChoiceState::Content;
        c.current.push_str(&text);

        if self.first_token.is_none() {
            self.first_token = Some(self.started.elapsed());
        }
        self.pending.push(text);
    }

    fn tool_call_start(&mut self, choice: u32, index: u32, id: String, name: String) {
        let Some(c) = self.open_choice(choice) else {
            return;
        };
        c.close_segment();
        c.state = ChoiceState::ToolCall;
        self.has_tool_calls = true;

        if let Some(builder) = self.open_tool_call(choice, index) {
            // repeated start frames only ever fill in missing identity
            if builder.id.is_empty() {
                builder.id = id;
            }
            if builder.name.is_empty() {
                builder.name = name;
            }
            return;
        }

        self.tool_calls.push(ToolCallBuilder {
            choice,
            index,
            id,
            name,
            arguments: String::new(),
            complete: false,
        });
    }

    fn tool_call_delta(&mut self, choice: u32, index: u32, arguments: Arguments) {
        if self.open_tool_call(choice, index).is_none() {
            self.tool_call_start(choice, index, String::new(), String::new());
        }
        let Some(builder) = self.open_tool_call(choice, index) else {
            return;
        };

        match arguments {
            Arguments::Fragment(fragment) => builder.arguments.push_str(&fragment),
            Arguments::Whole(value) => {
                builder.arguments = serde_json::to_string(&value).unwrap_or_else(|_| "{}".to_owned());
            }
        }
    }

    /// Choice accepting events, or `None` once it is finished
    fn open_choice(&mut self, choice: u32) -> Option<&mut Choice> {
        let c = self.choices.entry(choice).or_default();
        if c.state == ChoiceState::Finished {
            tracing::debug!(choice, "ignoring event for finished choice");
            return None;
        }
        Some(c)
    }

    fn open_tool_call(&mut self, choice: u32, index: u32) -> Option<&mut ToolCallBuilder> {
        self.tool_calls
            .iter_mut()
            .find(|b| b.choice == choice && b.index == index && !b.complete)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn content(text: &str) -> StreamEvent {
        StreamEvent::Content {
            choice: 0,
            text: text.to_owned(),
        }
    }

    #[test]
    fn text_only_stream_yields_one_token_per_delta() {
        let mut acc = StreamAccumulator::new(Instant::now());
        for delta in ["Hel", "lo ", " world"] {
            acc.apply(content(delta));
        }
        acc.apply(StreamEvent::Done);

        assert!(acc.is_done());
        let outcome = acc.finish();
        assert_eq!(outcome.tokens, vec!["Hel", "lo ", " world"]);
        assert_eq!(outcome.message.text(), "Hello  world");
        assert!(outcome.first_token.is_some());
    }

    #[test]
    fn tool_call_suppresses_all_tokens() {
        let mut acc = StreamAccumulator::new(Instant::now());
        acc.apply(content("Let me "));
        acc.apply(content("check."));
        acc.apply(StreamEvent::ToolCallStart {
            choice: 0,
            index: 0,
            id: "call_1".to_owned(),
            name: "weather".to_owned(),
        });
        acc.apply(StreamEvent::ToolCallDelta {
            choice: 0,
            index: 0,
            arguments: Arguments::Fragment(r#"{"city":"#.to_owned()),
        });
        acc.apply(StreamEvent::ToolCallDelta {
            choice: 0,
            index: 0,
            arguments: Arguments::Fragment(r#""Oslo"}"#.to_owned()),
        });
        acc.apply(StreamEvent::ToolCallStop { choice: 0, index: 0 });
        acc.apply(StreamEvent::Done);

        assert!(acc.has_tool_calls());
        let outcome = acc.finish();
        assert!(outcome.tokens.is_empty());
        assert_eq!(outcome.message.text(), "Let me check.");
        assert_eq!(outcome.message.tool_calls.len(), 1);
        assert_eq!(outcome.message.tool_calls[0].function.arguments, r#"{"city":"Oslo"}"#);
    }

    #[test]
    fn tool_call_flag_never_reverts() {
        let mut acc = StreamAccumulator::new(Instant::now());
        acc.apply(StreamEvent::ToolCallStart {
            choice: 0,
            index: 0,
            id: "a".to_owned(),
            name: "f".to_owned(),
        });
        acc.apply(StreamEvent::ToolCallStop { choice: 0, index: 0 });
        acc.apply(content("after the tool"));

        assert!(acc.has_tool_calls());
        assert!(acc.finish().tokens.is_empty());
    }

    #[test]
    fn whole_arguments_are_reserialized() {
        let mut acc = StreamAccumulator::new(Instant::now());
        acc.apply(StreamEvent::ToolCallStart {
            choice: 1,
            index: 0,
            id: "g1".to_owned(),
            name: "search".to_owned(),
        });
        acc.apply(StreamEvent::ToolCallDelta {
            choice: 1,
            index: 0,
            arguments: Arguments::Whole(json!({"query": "weather in NYC"})),
        });

        let outcome = acc.finish();
        let args: serde_json::Value = serde_json::from_str(&outcome.message.tool_calls[0].function.arguments).unwrap();
        assert_eq!(args, json!({"query": "weather in NYC"}));
    }

    #[test]
    fn empty_arguments_become_empty_object() {
        let mut acc = StreamAccumulator::new(Instant::now());
        acc.apply(StreamEvent::ToolCallStart {
            choice: 0,
            index: 0,
            id: "t".to_owned(),
            name: "now".to_owned(),
        });
        acc.apply(StreamEvent::ToolCallStop { choice: 0, index: 0 });

        assert_eq!(acc.finish().message.tool_calls[0].function.arguments, "{}");
    }

    #[test]
    fn delta_without_start_opens_a_tool_call() {
        let mut acc = StreamAccumulator::new(Instant::now());
        acc.apply(StreamEvent::ToolCallDelta {
            choice: 0,
            index: 2,
            arguments: Arguments::Fragment("{}".to_owned()),
        });
        assert!(acc.has_tool_calls());
        assert_eq!(acc.state(0), ChoiceState::ToolCall);
    }

    #[test]
    fn content_blocks_become_separate_segments() {
        let mut acc = StreamAccumulator::new(Instant::now());
        acc.apply(content("first"));
        acc.apply(StreamEvent::ContentStop { choice: 0 });
        acc.apply(content("second"));

        assert_eq!(acc.finish().message.contents, vec!["first", "second"]);
    }

    #[test]
    fn finished_choice_ignores_late_events() {
        let mut acc = StreamAccumulator::new(Instant::now());
        acc.apply(content("done"));
        acc.apply(StreamEvent::Finish { choice: 0 });
        acc.apply(content(" late"));

        assert_eq!(acc.state(0), ChoiceState::Finished);
        let outcome = acc.finish();
        assert_eq!(outcome.message.text(), "done");
        assert_eq!(outcome.tokens, vec!["done"]);
    }

    #[test]
    fn choices_are_emitted_in_index_order() {
        let mut acc = StreamAccumulator::new(Instant::now());
        acc.apply(StreamEvent::Content {
            choice: 1,
            text: "b".to_owned(),
        });
        acc.apply(content("a"));

        assert_eq!(acc.finish().message.contents, vec!["a", "b"]);
    }

    #[test]
    fn usage_reports_are_merged() {
        let mut acc = StreamAccumulator::new(Instant::now());
        acc.apply(StreamEvent::Usage(TokenUsage {
            input: Some(11),
            ..TokenUsage::default()
        }));
        acc.apply(StreamEvent::Usage(TokenUsage {
            output: Some(3),
            ..TokenUsage::default()
        }));

        let usage = acc.finish().usage;
        assert_eq!((usage.input, usage.output), (Some(11), Some(3)));
    }
}
