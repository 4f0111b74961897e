//! HTTP plumbing shared by the adapters

use std::time::Duration;

use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::caller::VerificationStatus;
use crate::error::LlmError;

/// Send a request and return the JSON body, bounded by `timeout`
pub(crate) async fn send_json(provider: &str, builder: RequestBuilder, timeout: Duration) -> Result<Value, LlmError> {
    let exchange = async {
        let response = send(provider, builder).await?;
        response
            .json::<Value>()
            .await
            .map_err(|e| LlmError::transport(format!("failed to read response: {e}")))
    };

    tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| LlmError::Timeout(timeout))?
}

/// Send a request whose response will be read as a stream
///
/// Only the initial exchange is bounded by `timeout`; the stream itself
/// runs as long as the vendor keeps it open.
pub(crate) async fn open_stream(
    provider: &str,
    builder: RequestBuilder,
    timeout: Duration,
) -> Result<Response, LlmError> {
    tokio::time::timeout(timeout, send(provider, builder))
        .await
        .map_err(|_| LlmError::Timeout(timeout))?
}

/// Decode a vendor body into its wire type
pub(crate) fn decode<T: DeserializeOwned>(provider: &str, raw: &Value) -> Result<T, LlmError> {
    T::deserialize(raw).map_err(|e| {
        tracing::warn!(provider, error = %e, "unexpected vendor response shape");
        LlmError::transport(format!("failed to parse response: {e}"))
    })
}

/// Server-sent events from a streaming response, as raw `data` payloads
///
/// Each item is `(event, data)`; vendors that type frames by the `event`
/// field (Anthropic) need both.
pub(crate) fn sse_frames(response: Response) -> impl Stream<Item = Result<(String, String), LlmError>> + Send {
    response.bytes_stream().eventsource().map(|result| match result {
        Ok(event) => Ok((event.event, event.data)),
        Err(e) => Err(LlmError::Streaming(e.to_string())),
    })
}

/// Classify a credential check response
///
/// 401 and 403 are definitive rejections; every other failure is
/// inconclusive and surfaces as an error.
pub(crate) async fn verify(provider: &str, builder: RequestBuilder, timeout: Duration) -> Result<VerificationStatus, LlmError> {
    let response = tokio::time::timeout(timeout, builder.send())
        .await
        .map_err(|_| LlmError::Timeout(timeout))?
        .map_err(|e| {
            tracing::error!(provider, error = %e, "credential check request failed");
            LlmError::transport(e)
        })?;

    classify(provider, response).await
}

pub(crate) async fn classify(provider: &str, response: Response) -> Result<VerificationStatus, LlmError> {
    let status = response.status();
    if status == http::StatusCode::UNAUTHORIZED || status == http::StatusCode::FORBIDDEN {
        tracing::info!(provider, status = %status, "credential rejected by vendor");
        return Ok(VerificationStatus::Invalid);
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(LlmError::status(status, &body));
    }

    Ok(VerificationStatus::Valid)
}

async fn send(provider: &str, builder: RequestBuilder) -> Result<Response, LlmError> {
    let response = builder.send().await.map_err(|e| {
        tracing::error!(provider, error = %e, "upstream request failed");
        LlmError::transport(e)
    })?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(provider, status = %status, "upstream returned error");
        return Err(LlmError::status(status, &body));
    }

    Ok(response)
}
