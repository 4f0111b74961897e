//! Prompt flattening for Replicate language models
//!
//! Replicate models take a single prompt string rather than a message list.

use switchboard_core::params::keys;
use switchboard_core::{AssistantMessage, Message, ModelParameters, TokenUsage, UsageMetrics};

use crate::protocol::replicate::{ReplicateInput, ReplicateMetrics, ReplicateOutput};

/// Flatten a history into `(prompt, system_prompt)`
///
/// A lone user message is sent as-is. Anything longer becomes a
/// `role: text` transcript, with system messages lifted into the system
/// prompt.
pub fn build_prompt(history: &[Message]) -> (String, Option<String>) {
    if let [Message::User(m)] = history {
        return (m.content.clone(), None);
    }

    let mut system = Vec::new();
    let mut lines = Vec::with_capacity(history.len());

    for message in history {
        match message {
            Message::System(m) => system.extend(super::system_text(&m.content)),
            Message::User(m) => lines.push(format!("user: {}", m.content)),
            Message::Assistant(m) => {
                let text = m.text();
                if !text.is_empty() {
                    lines.push(format!("assistant: {text}"));
                }
            }
            Message::Tool(m) => lines.extend(m.tools.iter().map(|r| format!("tool: {}", r.content))),
        }
    }

    let system_prompt = if system.is_empty() { None } else { Some(system.join("\n\n")) };
    (lines.join("\n"), system_prompt)
}

/// Model input from a history and sampling parameters
pub fn build_input(history: &[Message], params: &ModelParameters) -> ReplicateInput {
    let (prompt, system_prompt) = build_prompt(history);
    let stop = params.string_list(keys::STOP);

    ReplicateInput {
        prompt,
        system_prompt,
        max_tokens: params
            .unsigned(keys::MAX_TOKENS)
            .or_else(|| params.unsigned(keys::MAX_COMPLETION_TOKENS)),
        temperature: params.float(keys::TEMPERATURE),
        top_p: params.float(keys::TOP_P),
        top_k: params.unsigned(keys::TOP_K),
        stop_sequences: if stop.is_empty() { None } else { Some(stop.join(",")) },
        seed: params.integer(keys::SEED),
    }
}

/// Final prediction output as one assistant message
pub fn parse_output(output: Option<ReplicateOutput>) -> AssistantMessage {
    let text = match output {
        Some(ReplicateOutput::Chunks(chunks)) => chunks.concat(),
        Some(ReplicateOutput::Text(text)) => text,
        None => String::new(),
    };

    if text.is_empty() {
        AssistantMessage::default()
    } else {
        AssistantMessage::new(vec![text], Vec::new())
    }
}

impl UsageMetrics for ReplicateMetrics {
    fn token_usage(&self) -> TokenUsage {
        TokenUsage {
            input: self.input_token_count,
            output: self.output_token_count,
            ..TokenUsage::default()
        }
    }
}
