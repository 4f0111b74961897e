//! Vendor-neutral streaming
//!
//! Adapters translate their native stream framing into [`StreamEvent`]s.
//! [`StreamAccumulator`] folds those events into a final message and
//! [`driver::drive`] applies the token delivery policy.

pub mod accumulator;
pub mod driver;

use std::pin::Pin;

use futures_util::Stream;
use serde_json::Value;
use switchboard_core::TokenUsage;

pub use accumulator::{ChoiceState, StreamAccumulator, StreamOutcome};

use crate::error::LlmError;

/// Boxed stream of canonical events produced by an adapter
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send>>;

/// Canonical streaming transition
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Text delta for a choice
    Content { choice: u32, text: String },
    /// The current text block of a choice is complete
    ContentStop { choice: u32 },
    /// A new tool call opened
    ToolCallStart {
        choice: u32,
        /// Position of the tool call within the choice
        index: u32,
        id: String,
        name: String,
    },
    /// Arguments for an open tool call
    ToolCallDelta {
        choice: u32,
        index: u32,
        arguments: Arguments,
    },
    /// A tool call is complete
    ToolCallStop { choice: u32, index: u32 },
    /// A choice finished generating
    Finish { choice: u32 },
    /// Usage counters; later reports overlay earlier ones
    Usage(TokenUsage),
    /// The vendor signalled the end of the response
    Done,
}

/// Tool call argument payload
#[derive(Debug, Clone, PartialEq)]
pub enum Arguments {
    /// Raw JSON text to append verbatim
    Fragment(String),
    /// A complete argument object that replaces anything accumulated so far
    Whole(Value),
}
