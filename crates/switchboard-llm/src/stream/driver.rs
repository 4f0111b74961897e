//! The single read loop shared by every streaming adapter

use futures_util::StreamExt;
use switchboard_core::{Message, Metric, RequestContext};

use super::{EventStream, StreamAccumulator};
use crate::call::Call;
use crate::caller::StreamSink;
use crate::error::LlmError;

/// Read a vendor event stream to completion and deliver it to the sink
///
/// Text is withheld until the stream ends. If the response never carried a
/// tool call, each buffered delta is then forwarded as its own token, in
/// order; otherwise no tokens are sent at all. `on_complete` follows
/// exactly once with the full message.
///
/// A vendor error calls `on_error` and ends the call; tokens cannot have
/// been forwarded yet at that point. Cancellation ends the call without
/// touching the sink.
pub(crate) async fn drive(
    mut events: EventStream,
    mut call: Call<'_>,
    context: &RequestContext,
    sink: &mut dyn StreamSink,
) -> Result<(), LlmError> {
    let mut accumulator = StreamAccumulator::new(call.started_at());

    loop {
        let next = tokio::select! {
            biased;
            () = context.cancellation.cancelled() => {
                tracing::debug!("client cancelled stream, discarding partial response");
                call.abort(&LlmError::Cancelled);
                return Err(LlmError::Cancelled);
            }
            next = events.next() => next,
        };

        match next {
            Some(Ok(event)) => {
                accumulator.apply(event);
                if accumulator.is_done() {
                    break;
                }
            }
            Some(Err(error)) => {
                sink.on_error(&error).await;
                call.abort(&error);
                return Err(error);
            }
            // end of body without an explicit terminator
            None => break,
        }
    }

    let outcome = accumulator.finish();

    for token in outcome.tokens {
        if let Err(e) = sink.on_token(Message::assistant(token)).await {
            tracing::warn!(error = %e, "failed to deliver stream token");
        }
    }

    if !outcome.usage.is_empty() {
        call.metrics_mut().add_usage(&outcome.usage);
    }
    if let Some(elapsed) = outcome.first_token {
        call.metrics_mut().add_metric(Metric::first_token(elapsed));
    }

    let message = Message::Assistant(outcome.message);
    let metrics = call.complete(&message);

    sink.on_complete(message, metrics).await.map_err(LlmError::Internal)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use futures_util::stream;
    use serde_json::Value;
    use switchboard_core::Hooks;
    use switchboard_core::metrics::names;

    use super::*;
    use crate::stream::{Arguments, StreamEvent};

    /// Sink that records every callback
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub tokens: Vec<String>,
        pub completed: Vec<(Message, Vec<Metric>)>,
        pub errors: Vec<String>,
    }

    #[async_trait]
    impl StreamSink for RecordingSink {
        async fn on_token(&mut self, token: Message) -> anyhow::Result<()> {
            self.tokens.push(token.text().unwrap_or_default());
            Ok(())
        }

        async fn on_complete(&mut self, message: Message, metrics: Vec<Metric>) -> anyhow::Result<()> {
            self.completed.push((message, metrics));
            Ok(())
        }

        async fn on_error(&mut self, error: &LlmError) {
            self.errors.push(error.to_string());
        }
    }

    fn events(items: Vec<Result<StreamEvent, LlmError>>) -> EventStream {
        Box::pin(stream::iter(items))
    }

    fn text(t: &str) -> Result<StreamEvent, LlmError> {
        Ok(StreamEvent::Content {
            choice: 0,
            text: t.to_owned(),
        })
    }

    #[tokio::test]
    async fn forwards_each_delta_when_no_tool_call() {
        let hooks = Hooks::noop();
        let mut call = Call::start("test", 1, &hooks);
        call.dispatch(&Value::Null);
        let mut sink = RecordingSink::default();

        drive(
            events(vec![text("Hel"), text("lo "), text(" world"), Ok(StreamEvent::Done)]),
            call,
            &RequestContext::empty(),
            &mut sink,
        )
        .await
        .unwrap();

        assert_eq!(sink.tokens, vec!["Hel", "lo ", " world"]);
        assert_eq!(sink.completed.len(), 1);
        let (message, metrics) = &sink.completed[0];
        assert_eq!(message.text().unwrap(), sink.tokens.concat());
        assert!(metrics.iter().any(|m| m.name == names::STATUS && m.value == "SUCCESS"));
        assert!(metrics.iter().any(|m| m.name == names::FIRST_TOKEN_RECEIVED_TIME));
    }

    #[tokio::test]
    async fn tool_call_stream_sends_no_tokens() {
        let hooks = Hooks::noop();
        let call = Call::start("test", 1, &hooks);
        let mut sink = RecordingSink::default();

        drive(
            events(vec![
                text("Let me "),
                text("look."),
                Ok(StreamEvent::ToolCallStart {
                    choice: 0,
                    index: 0,
                    id: "call_1".to_owned(),
                    name: "lookup".to_owned(),
                }),
                Ok(StreamEvent::ToolCallDelta {
                    choice: 0,
                    index: 0,
                    arguments: Arguments::Fragment("{}".to_owned()),
                }),
                Ok(StreamEvent::ToolCallStop { choice: 0, index: 0 }),
                Ok(StreamEvent::Done),
            ]),
            call,
            &RequestContext::empty(),
            &mut sink,
        )
        .await
        .unwrap();

        assert!(sink.tokens.is_empty());
        assert_eq!(sink.completed.len(), 1);
        let assistant = sink.completed[0].0.as_assistant().unwrap();
        assert_eq!(assistant.text(), "Let me look.");
        assert_eq!(assistant.tool_calls[0].function.name, "lookup");
    }

    #[tokio::test]
    async fn vendor_error_reports_and_stops() {
        let hooks = Hooks::noop();
        let call = Call::start("test", 1, &hooks);
        let mut sink = RecordingSink::default();

        let result = drive(
            events(vec![text("partial"), Err(LlmError::Streaming("connection reset".to_owned()))]),
            call,
            &RequestContext::empty(),
            &mut sink,
        )
        .await;

        assert!(matches!(result, Err(LlmError::Streaming(_))));
        assert_eq!(sink.errors.len(), 1);
        assert!(sink.tokens.is_empty());
        assert!(sink.completed.is_empty());
    }

    #[tokio::test]
    async fn cancellation_discards_partial_state() {
        let hooks = Hooks::noop();
        let call = Call::start("test", 1, &hooks);
        let mut sink = RecordingSink::default();
        let context = RequestContext::empty();
        context.cancellation.cancel();

        let pending: EventStream = Box::pin(stream::iter(vec![text("never")]).chain(stream::pending()));
        let result = drive(pending, call, &context, &mut sink).await;

        assert!(matches!(result, Err(LlmError::Cancelled)));
        assert!(sink.completed.is_empty());
        assert!(sink.errors.is_empty());
    }

    #[tokio::test]
    async fn cancelled_stream_still_reports_post_hook() {
        let posted = Arc::new(Mutex::new(Vec::new()));
        let sink_posted = Arc::clone(&posted);
        let hooks = Hooks::new(
            Arc::new(|_: Value| {}),
            Arc::new(move |_: Value, metrics: Vec<Metric>| sink_posted.lock().unwrap().push(metrics)),
        );
        let mut call = Call::start("test", 1, &hooks);
        call.dispatch(&Value::Null);
        let context = RequestContext::empty();
        context.cancellation.cancel();

        let _ = drive(events(vec![]), call, &context, &mut RecordingSink::default()).await;

        let posted = posted.lock().unwrap();
        assert_eq!(posted.len(), 1);
        assert!(posted[0].iter().any(|m| m.name == names::STATUS && m.value == "FAILED"));
    }
}
