//! Conversion between the canonical model and the Google `generateContent` format
//!
//! Shared by Gemini and Vertex AI. Embedding payloads differ between the two
//! and have their own builders.

use std::collections::HashMap;

use serde_json::Value;
use switchboard_core::params::keys;
use switchboard_core::{
    AssistantMessage, ChatCompletionOptions, Embedding, IndexedContent, Message, ModelParameters, TokenUsage, ToolCall,
    UsageMetrics,
};

use super::{ChoiceOutput, arguments_object, arguments_string, assemble, tool_result_value};
use crate::error::LlmError;
use crate::ordering;
use crate::protocol::google::{
    GoogleBatchEmbedRequest, GoogleBatchEmbedResponse, GoogleContent, GoogleEmbedContentRequest, GoogleFunctionCall,
    GoogleFunctionCallingConfig, GoogleFunctionDeclaration, GoogleFunctionResponse, GoogleGenerationConfig, GooglePart,
    GoogleRequest, GoogleResponse, GoogleThinkingConfig, GoogleTool, GoogleToolConfig, GoogleUsageMetadata,
    VertexEmbeddingInstance, VertexEmbeddingParameters, VertexPredictRequest, VertexPredictResponse,
};
use crate::stream::{Arguments, StreamEvent};

// -- Outbound: canonical history -> Google wire request --

/// Split a canonical history into the system instruction and contents
pub fn build_contents(history: &[Message]) -> (Option<GoogleContent>, Vec<GoogleContent>) {
    let mut system = Vec::new();
    let mut contents = Vec::with_capacity(history.len());

    for message in history {
        match message {
            Message::System(m) => system.extend(super::system_text(&m.content).map(GooglePart::text)),
            Message::User(m) => contents.push(GoogleContent {
                role: Some("user".to_owned()),
                parts: vec![GooglePart::text(m.content.clone())],
            }),
            Message::Assistant(m) => {
                if m.is_empty() {
                    continue;
                }
                let mut parts = Vec::with_capacity(m.tool_calls.len() + 1);
                let text = m.text();
                if !text.is_empty() {
                    parts.push(GooglePart::text(text));
                }
                parts.extend(m.tool_calls.iter().map(|tc| {
                    GooglePart::function_call(GoogleFunctionCall {
                        id: None,
                        name: tc.function.name.clone(),
                        args: arguments_object(&tc.function.arguments),
                    })
                }));
                contents.push(GoogleContent {
                    role: Some("model".to_owned()),
                    parts,
                });
            }
            Message::Tool(m) => contents.push(GoogleContent {
                role: Some("user".to_owned()),
                parts: m
                    .tools
                    .iter()
                    .map(|result| {
                        GooglePart::function_response(GoogleFunctionResponse {
                            id: None,
                            name: result.name.clone(),
                            response: tool_result_value(&result.content),
                        })
                    })
                    .collect(),
            }),
        }
    }

    let system = if system.is_empty() {
        None
    } else {
        Some(GoogleContent { role: None, parts: system })
    };
    (system, contents)
}

/// Build a `generateContent` request
pub fn build_request(history: &[Message], options: &ChatCompletionOptions) -> GoogleRequest {
    let params = &options.model_parameters;
    let (system_instruction, contents) = build_contents(history);

    let tools = if options.tool_definitions.is_empty() {
        None
    } else {
        Some(vec![GoogleTool {
            function_declarations: options
                .tool_definitions
                .iter()
                .map(|t| GoogleFunctionDeclaration {
                    name: t.function.name.clone(),
                    description: t.function.description.clone(),
                    parameters: t.function.parameters_or_empty(),
                })
                .collect(),
        }])
    };
    let tool_config = tools.as_ref().and_then(|_| parse_tool_config(params));

    let config = generation_config(params);
    GoogleRequest {
        contents,
        system_instruction,
        generation_config: (config != GoogleGenerationConfig::default()).then_some(config),
        tools,
        tool_config,
    }
}

fn generation_config(params: &ModelParameters) -> GoogleGenerationConfig {
    let stop = params.string_list(keys::STOP);
    let format = params.object(keys::RESPONSE_FORMAT);
    let thinking = params.object(keys::THINKING).map(|t| GoogleThinkingConfig {
        include_thoughts: t.get("include_thoughts").and_then(Value::as_bool),
        thinking_budget: t.get("thinking_budget").and_then(Value::as_i64),
    });

    GoogleGenerationConfig {
        temperature: params.float(keys::TEMPERATURE),
        top_p: params.float(keys::TOP_P),
        top_k: params.unsigned(keys::TOP_K),
        max_output_tokens: params.unsigned(keys::MAX_COMPLETION_TOKENS),
        stop_sequences: if stop.is_empty() { None } else { Some(stop) },
        frequency_penalty: params.float(keys::FREQUENCY_PENALTY),
        presence_penalty: params.float(keys::PRESENCE_PENALTY),
        seed: params.integer(keys::SEED),
        response_mime_type: format
            .as_ref()
            .and_then(|f| f.get("response_mime_type"))
            .and_then(Value::as_str)
            .map(ToOwned::to_owned),
        response_schema: format.as_ref().and_then(|f| f.get("response_schema")).cloned(),
        thinking_config: thinking,
    }
}

/// Function calling mode from `model.tool_choice`
fn parse_tool_config(params: &ModelParameters) -> Option<GoogleToolConfig> {
    let choice = params.string(keys::TOOL_CHOICE)?;
    let mode = match choice.to_ascii_lowercase().as_str() {
        "auto" => "AUTO",
        "any" | "required" => "ANY",
        "none" => "NONE",
        other => {
            tracing::debug!(tool_choice = other, "unknown tool choice, disabling tools");
            "NONE"
        }
    };
    Some(GoogleToolConfig {
        function_calling_config: GoogleFunctionCallingConfig { mode: mode.to_owned() },
    })
}

// -- Inbound: Google wire response -> canonical message --

/// Identifier for a function call the vendor did not name
fn call_id(candidate: u32, index: u32) -> String {
    format!("call_{candidate}_{index}")
}

/// Parse a unary response into the assistant message
///
/// Function calls are indexed per candidate and their `args` re-serialised.
pub fn parse_response(response: GoogleResponse) -> AssistantMessage {
    let choices = response.candidates.into_iter().enumerate().map(|(position, candidate)| {
        let choice = candidate.index.unwrap_or_else(|| u32::try_from(position).unwrap_or(u32::MAX));
        let mut text = String::new();
        let mut tool_calls = Vec::new();

        for part in candidate.content.parts {
            if let Some(call) = part.function_call {
                let index = u32::try_from(tool_calls.len()).unwrap_or(u32::MAX);
                let id = call.id.unwrap_or_else(|| call_id(choice, index));
                tool_calls.push(ToolCall::function(id, call.name, arguments_string(&call.args)));
            } else if let Some(t) = part.text
                && part.thought != Some(true)
            {
                text.push_str(&t);
            }
        }

        ChoiceOutput {
            finish: candidate.finish_reason,
            text: Some(text),
            tool_calls,
        }
    });

    assemble(choices)
}

impl UsageMetrics for GoogleUsageMetadata {
    fn token_usage(&self) -> TokenUsage {
        TokenUsage {
            input: self.prompt_token_count,
            output: self.candidates_token_count,
            total: self.total_token_count,
            cached_content: self.cached_content_token_count,
            tool_use_prompt: self.tool_use_prompt_token_count,
            thoughts: self.thoughts_token_count,
            ..TokenUsage::default()
        }
    }
}

// -- Stream conversion --

/// State for translating one Google event stream
///
/// Each chunk carries whole function calls, so a call becomes a start,
/// a whole-arguments delta and a stop in one go. Tool call indices keep
/// counting across chunks per candidate.
#[derive(Debug, Default)]
pub struct GoogleStreamState {
    next_tool_index: HashMap<u32, u32>,
}

impl GoogleStreamState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Translate one SSE `data:` payload; unparseable payloads are skipped
    pub fn frame_events(&mut self, data: &str) -> Result<Vec<StreamEvent>, LlmError> {
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

        match serde_json::from_value::<GoogleResponse>(value) {
            Ok(chunk) => Ok(self.chunk_events(chunk)),
            Err(e) => {
                tracing::debug!(error = %e, "skipping SSE chunk with unexpected shape");
                Ok(Vec::new())
            }
        }
    }

    pub fn chunk_events(&mut self, chunk: GoogleResponse) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        for (position, candidate) in chunk.candidates.into_iter().enumerate() {
            let choice = candidate.index.unwrap_or_else(|| u32::try_from(position).unwrap_or(u32::MAX));

            for part in candidate.content.parts {
                if let Some(call) = part.function_call {
                    let next = self.next_tool_index.entry(choice).or_insert(0);
                    let index = *next;
                    *next += 1;

                    events.push(StreamEvent::ToolCallStart {
                        choice,
                        index,
                        id: call.id.unwrap_or_else(|| call_id(choice, index)),
                        name: call.name,
                    });
                    events.push(StreamEvent::ToolCallDelta {
                        choice,
                        index,
                        arguments: Arguments::Whole(call.args),
                    });
                    events.push(StreamEvent::ToolCallStop { choice, index });
                } else if let Some(text) = part.text
                    && part.thought != Some(true)
                {
                    events.push(StreamEvent::Content { choice, text });
                }
            }

            if candidate.finish_reason.is_some() {
                events.push(StreamEvent::Finish { choice });
            }
        }

        if let Some(usage) = chunk.usage_metadata {
            events.push(StreamEvent::Usage(usage.token_usage()));
        }

        events
    }
}

// -- Embeddings --

/// Gemini `batchEmbedContents` request, one entry per text in index order
pub fn build_batch_embed_request(model: &str, content: &IndexedContent, params: &ModelParameters) -> GoogleBatchEmbedRequest {
    let model = if model.starts_with("models/") { model.to_owned() } else { format!("models/{model}") };
    let task_type = params.string(keys::INPUT_TYPE);
    let output_dimensionality = params.unsigned(keys::DIMENSIONS);

    GoogleBatchEmbedRequest {
        requests: ordering::ordered_texts(content)
            .into_iter()
            .map(|text| GoogleEmbedContentRequest {
                model: model.clone(),
                content: GoogleContent {
                    role: None,
                    parts: vec![GooglePart::text(text)],
                },
                task_type: task_type.clone(),
                output_dimensionality,
            })
            .collect(),
    }
}

/// Gemini embeddings come back in request order
pub fn parse_batch_embed(content: &IndexedContent, response: GoogleBatchEmbedResponse) -> Result<Vec<Embedding>, LlmError> {
    ordering::restore_embeddings(content, response.embeddings.into_iter().map(|e| e.values).enumerate())
}

/// Vertex `predict` request for a text embedding model
pub fn build_predict_request(content: &IndexedContent, params: &ModelParameters) -> VertexPredictRequest {
    let task_type = params.string(keys::INPUT_TYPE);
    VertexPredictRequest {
        instances: ordering::ordered_texts(content)
            .into_iter()
            .map(|text| VertexEmbeddingInstance {
                content: text,
                task_type: task_type.clone(),
            })
            .collect(),
        parameters: params
            .unsigned(keys::DIMENSIONS)
            .map(|d| VertexEmbeddingParameters {
                output_dimensionality: Some(d),
            }),
    }
}

/// Vertex predictions come back in request order
pub fn parse_predict(content: &IndexedContent, response: &VertexPredictResponse) -> Result<Vec<Embedding>, LlmError> {
    ordering::restore_embeddings(
        content,
        response
            .predictions
            .iter()
            .map(|p| p.embeddings.values.clone())
            .enumerate(),
    )
}

impl UsageMetrics for VertexPredictResponse {
    /// Input tokens summed over the embedded texts
    fn token_usage(&self) -> TokenUsage {
        let counts: Vec<f64> = self
            .predictions
            .iter()
            .filter_map(|p| p.embeddings.statistics.as_ref().and_then(|s| s.token_count))
            .collect();
        if counts.is_empty() {
            return TokenUsage::default();
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let input = counts.iter().sum::<f64>() as u64;
        TokenUsage {
            input: Some(input),
            ..TokenUsage::default()
        }
    }
}
