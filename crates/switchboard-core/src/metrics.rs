//! Per-call metric set
//!
//! Every call path owns one [`MetricBuilder`]. It is seeded with the request
//! id, a `FAILED` status and a zero elapsed time, so even a call that dies
//! before reaching the vendor reports something meaningful.

use std::time::{Duration, Instant};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Canonical metric names
pub mod names {
    pub const TIME_TAKEN: &str = "TIME_TAKEN";
    pub const STATUS: &str = "STATUS";
    pub const LLM_REQUEST_ID: &str = "LLM_REQUEST_ID";
    pub const INPUT_TOKEN: &str = "INPUT_TOKEN";
    pub const OUTPUT_TOKEN: &str = "OUTPUT_TOKEN";
    pub const TOTAL_TOKEN: &str = "TOTAL_TOKEN";
    pub const FIRST_TOKEN_RECEIVED_TIME: &str = "FIRST_TOKEN_RECEIVED_TIME";
    pub const CACHED_INPUT_TOKEN: &str = "CACHED_INPUT_TOKEN";
    pub const CACHE_CREATION_INPUT_TOKEN: &str = "CACHE_CREATION_INPUT_TOKEN";
    pub const REASONING_TOKEN: &str = "REASONING_TOKEN";
    pub const CACHED_CONTENT_TOKEN: &str = "CACHED_CONTENT_TOKEN";
    pub const TOOL_USE_PROMPT_TOKEN: &str = "TOOL_USE_PROMPT_TOKEN";
    pub const THOUGHTS_TOKEN: &str = "THOUGHTS_TOKEN";
    pub const BILLED_INPUT_UNIT: &str = "BILLED_INPUT_UNIT";
    pub const BILLED_OUTPUT_UNIT: &str = "BILLED_OUTPUT_UNIT";
    pub const BILLED_SEARCH_UNIT: &str = "BILLED_SEARCH_UNIT";
}

/// A single named measurement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    /// String-encoded value
    pub value: String,
    pub description: String,
}

impl Metric {
    pub fn new(name: impl Into<String>, value: impl ToString, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.to_string(),
            description: description.into(),
        }
    }

    /// Time from call start to the first streamed text delta
    pub fn first_token(elapsed: Duration) -> Self {
        Self::new(
            names::FIRST_TOKEN_RECEIVED_TIME,
            elapsed.as_nanos(),
            "Time to receive first token from LLM",
        )
    }
}

/// Terminal call status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Failed,
}

impl Status {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }
}

/// Accumulates timing, status and usage metrics for one call
///
/// Metrics are keyed by name; inserting an existing name overwrites it.
#[derive(Debug, Clone)]
pub struct MetricBuilder {
    started: Instant,
    metrics: IndexMap<String, Metric>,
}

impl MetricBuilder {
    pub fn new(request_id: u64) -> Self {
        let mut builder = Self {
            started: Instant::now(),
            metrics: IndexMap::new(),
        };
        builder.add_metric(Metric::new(names::LLM_REQUEST_ID, request_id, "Request id of the LLM call"));
        builder.seed();
        builder
    }

    /// Snapshot the clock and reset the status to `FAILED`
    pub fn start(&mut self) -> &mut Self {
        self.started = Instant::now();
        self.seed();
        self
    }

    /// Mark the call successful and record the elapsed time
    pub fn success(&mut self) -> &mut Self {
        self.finish(Status::Success)
    }

    /// Mark the call failed and record the elapsed time
    pub fn failure(&mut self) -> &mut Self {
        self.finish(Status::Failed)
    }

    pub fn add_metric(&mut self, metric: Metric) -> &mut Self {
        self.metrics.insert(metric.name.clone(), metric);
        self
    }

    pub fn add_metrics(&mut self, metrics: impl IntoIterator<Item = Metric>) -> &mut Self {
        for metric in metrics {
            self.add_metric(metric);
        }
        self
    }

    /// Normalize a vendor usage object into canonical token metrics
    pub fn add_usage(&mut self, usage: &impl UsageMetrics) -> &mut Self {
        self.add_metrics(usage.token_usage().into_metrics())
    }

    /// Time since the last [`start`](Self::start)
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub const fn started_at(&self) -> Instant {
        self.started
    }

    /// Current status as recorded in the set
    pub fn status(&self) -> Option<&str> {
        self.metrics.get(names::STATUS).map(|m| m.value.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&Metric> {
        self.metrics.get(name)
    }

    /// De-duplicated metric list in first-insertion order
    pub fn build(&self) -> Vec<Metric> {
        self.metrics.values().cloned().collect()
    }

    fn seed(&mut self) {
        self.add_metric(Metric::new(names::TIME_TAKEN, 0, "Time taken to serve the LLM request"));
        self.add_metric(Metric::new(
            names::STATUS,
            Status::Failed.as_str(),
            "Status of the LLM request",
        ));
    }

    fn finish(&mut self, status: Status) -> &mut Self {
        let elapsed = self.elapsed().as_nanos();
        self.add_metric(Metric::new(names::TIME_TAKEN, elapsed, "Time taken to serve the LLM request"));
        self.add_metric(Metric::new(names::STATUS, status.as_str(), "Status of the LLM request"))
    }
}

/// Token accounting normalized across vendors
///
/// Only the three canonical counters are generally present; the rest are
/// vendor-specific extras.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input: Option<u64>,
    pub output: Option<u64>,
    pub total: Option<u64>,
    pub cached_input: Option<u64>,
    pub cache_creation_input: Option<u64>,
    pub reasoning: Option<u64>,
    pub cached_content: Option<u64>,
    pub tool_use_prompt: Option<u64>,
    pub thoughts: Option<u64>,
    pub billed_input: Option<u64>,
    pub billed_output: Option<u64>,
    pub billed_search: Option<u64>,
}

impl TokenUsage {
    pub const fn new(input: u64, output: u64) -> Self {
        Self {
            input: Some(input),
            output: Some(output),
            total: None,
            cached_input: None,
            cache_creation_input: None,
            reasoning: None,
            cached_content: None,
            tool_use_prompt: None,
            thoughts: None,
            billed_input: None,
            billed_output: None,
            billed_search: None,
        }
    }

    /// Overlay the counters present in `other`
    ///
    /// Streaming vendors report usage incrementally (Anthropic sends input
    /// tokens at message start and output tokens at message delta).
    pub fn merge(&mut self, other: Self) {
        macro_rules! overlay {
            ($($field:ident),*) => {
                $(if other.$field.is_some() { self.$field = other.$field; })*
            };
        }
        overlay!(
            input,
            output,
            total,
            cached_input,
            cache_creation_input,
            reasoning,
            cached_content,
            tool_use_prompt,
            thoughts,
            billed_input,
            billed_output,
            billed_search
        );
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Canonical metrics; `TOTAL_TOKEN` is derived when the vendor omits it
    pub fn into_metrics(self) -> Vec<Metric> {
        let total = self.total.or_else(|| match (self.input, self.output) {
            (Some(input), Some(output)) => Some(input + output),
            (Some(only), None) | (None, Some(only)) => Some(only),
            (None, None) => None,
        });

        [
            (names::INPUT_TOKEN, self.input, "Input token"),
            (names::OUTPUT_TOKEN, self.output, "Output token"),
            (names::TOTAL_TOKEN, total, "Total token"),
            (names::CACHED_INPUT_TOKEN, self.cached_input, "Input tokens served from the prompt cache"),
            (
                names::CACHE_CREATION_INPUT_TOKEN,
                self.cache_creation_input,
                "Input tokens written to the prompt cache",
            ),
            (names::REASONING_TOKEN, self.reasoning, "Output tokens spent on reasoning"),
            (names::CACHED_CONTENT_TOKEN, self.cached_content, "Tokens in the cached content"),
            (names::TOOL_USE_PROMPT_TOKEN, self.tool_use_prompt, "Tokens in tool-use prompts"),
            (names::THOUGHTS_TOKEN, self.thoughts, "Tokens spent on thinking"),
            (names::BILLED_INPUT_UNIT, self.billed_input, "Billed input units"),
            (names::BILLED_OUTPUT_UNIT, self.billed_output, "Billed output units"),
            (names::BILLED_SEARCH_UNIT, self.billed_search, "Billed search units"),
        ]
        .into_iter()
        .filter_map(|(name, value, description)| value.map(|v| Metric::new(name, v, description)))
        .collect()
    }
}

/// Vendor usage objects that can be normalized into [`TokenUsage`]
pub trait UsageMetrics {
    fn token_usage(&self) -> TokenUsage;
}

impl UsageMetrics for TokenUsage {
    fn token_usage(&self) -> TokenUsage {
        *self
    }
}
