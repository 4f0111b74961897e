//! Bookkeeping shared by every adapter call: metrics and audit hooks

use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use switchboard_core::{Hooks, Metric, MetricBuilder};

use crate::caller::Completion;
use crate::error::{CallError, CallResult, LlmError};

/// One in-flight vendor call
///
/// The post hook only fires for calls whose request actually went out,
/// so a call that fails on credential resolution leaves no audit trace.
pub(crate) struct Call<'a> {
    provider: &'a str,
    hooks: &'a Hooks,
    metrics: MetricBuilder,
    dispatched: bool,
}

impl<'a> Call<'a> {
    pub(crate) fn start(provider: &'a str, request_id: u64, hooks: &'a Hooks) -> Self {
        let mut metrics = MetricBuilder::new(request_id);
        metrics.start();
        Self {
            provider,
            hooks,
            metrics,
            dispatched: false,
        }
    }

    /// Record the vendor request body just before it is sent
    pub(crate) fn dispatch<T: Serialize + ?Sized>(&mut self, body: &T) {
        self.hooks.pre(body);
        self.dispatched = true;
    }

    pub(crate) const fn metrics_mut(&mut self) -> &mut MetricBuilder {
        &mut self.metrics
    }

    pub(crate) const fn started_at(&self) -> Instant {
        self.metrics.started_at()
    }

    /// Close the call from an adapter outcome carrying the raw vendor body
    pub(crate) fn settle<T>(self, outcome: Result<(T, Value), LlmError>) -> CallResult<T> {
        match outcome {
            Ok((data, raw)) => Ok(self.succeed(data, &raw)),
            Err(error) => Err(self.fail(error)),
        }
    }

    pub(crate) fn succeed<T, B: Serialize + ?Sized>(mut self, data: T, raw: &B) -> Completion<T> {
        let metrics = self.complete(raw);
        Completion { data, metrics }
    }

    pub(crate) fn fail(mut self, error: LlmError) -> CallError {
        let metrics = self.abort(&error);
        CallError { error, metrics }
    }

    /// Mark success and fire the post hook; returns the final metrics
    pub(crate) fn complete<B: Serialize + ?Sized>(&mut self, raw: &B) -> Vec<Metric> {
        self.metrics.success();
        let metrics = self.metrics.build();
        if self.dispatched {
            self.hooks.post(Some(raw), metrics.clone());
        }
        metrics
    }

    /// Mark failure and fire the post hook; returns the final metrics
    pub(crate) fn abort(&mut self, error: &LlmError) -> Vec<Metric> {
        tracing::warn!(provider = %self.provider, error = %error, "vendor call failed");
        self.metrics.failure();
        let metrics = self.metrics.build();
        if self.dispatched {
            self.hooks.post::<Value>(None, metrics.clone());
        }
        metrics
    }
}
