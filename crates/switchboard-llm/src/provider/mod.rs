//! Vendor adapters
//!
//! One struct per vendor, each holding its resolved credential and
//! exposing the capabilities the vendor supports. Keys are pulled from the
//! credential when a call is made, so a missing key fails that call before
//! any request is sent.

pub mod anthropic;
pub mod azure;
pub mod cohere;
pub mod gemini;
pub mod huggingface;
pub mod mistral;
pub mod openai;
pub mod replicate;
pub mod vertex;
pub mod voyage;

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde_json::Value;
use switchboard_core::{ModelParameters, RequestContext, ResolvedCredential};
use url::Url;

use crate::call::Call;
use crate::caller::StreamSink;
use crate::error::LlmError;
use crate::registry::ProviderSettings;
use crate::stream::StreamEvent;
use crate::stream::driver::drive;
use crate::transport::{decode, open_stream, send_json, sse_frames};

/// Credential keys read by the adapters
pub mod fields {
    /// API key, or the OAuth access token for Vertex AI
    pub const KEY: &str = "key";
    /// Base URL override
    pub const BASE_URL: &str = "base_url";
    /// Azure `OpenAI` resource key
    pub const SUBSCRIPTION_KEY: &str = "subscription_key";
    /// Azure `OpenAI` resource endpoint
    pub const ENDPOINT: &str = "endpoint";
    pub const API_VERSION: &str = "api_version";
    pub const PROJECT_ID: &str = "project_id";
    pub const REGION: &str = "region";
}

/// `model.name`, required by every call that names a model
pub(crate) fn model_name(params: &ModelParameters) -> Result<String, LlmError> {
    params
        .model_name()
        .ok_or_else(|| LlmError::InvalidRequest("model.name is required".to_owned()))
}

/// Base URL: the credential's override, then the configured one, then the
/// vendor default
pub(crate) fn base_url(
    credential: &ResolvedCredential,
    settings: &ProviderSettings,
    default: &str,
) -> Result<Url, LlmError> {
    if let Some(raw) = credential.optional(fields::BASE_URL) {
        return Url::parse(&raw).map_err(|e| LlmError::InvalidRequest(format!("invalid base_url `{raw}`: {e}")));
    }
    if let Some(url) = &settings.base_url {
        return Ok(url.clone());
    }
    Url::parse(default).map_err(|e| LlmError::Internal(anyhow::anyhow!("invalid default base URL {default}: {e}")))
}

/// `{base}/{path}` without doubled slashes
pub(crate) fn endpoint(base: &Url, path: &str) -> String {
    let base = base.as_str().trim_end_matches('/');
    format!("{base}/{}", path.trim_start_matches('/'))
}

/// Send a request and decode the vendor body, keeping the raw JSON for the
/// post hook
pub(crate) async fn exchange<T: DeserializeOwned>(
    provider: &str,
    builder: RequestBuilder,
    timeout: Duration,
) -> Result<(T, Value), LlmError> {
    let raw = send_json(provider, builder, timeout).await?;
    let parsed = decode(provider, &raw)?;
    Ok((parsed, raw))
}

/// Open an SSE stream and feed its translated frames through the driver
///
/// `translate` receives each frame as `(event, data)` and may keep state
/// across frames. A failure to open the stream is reported to the sink
/// like any other vendor stream error.
pub(crate) async fn run_stream<F>(
    mut call: Call<'_>,
    provider: &str,
    builder: RequestBuilder,
    timeout: Duration,
    context: &RequestContext,
    sink: &mut dyn StreamSink,
    mut translate: F,
) -> Result<(), LlmError>
where
    F: FnMut(&str, &str) -> Result<Vec<StreamEvent>, LlmError> + Send + 'static,
{
    let opened = tokio::select! {
        biased;
        () = context.cancellation.cancelled() => Err(LlmError::Cancelled),
        opened = open_stream(provider, builder, timeout) => opened,
    };

    let response = match opened {
        Ok(response) => response,
        Err(error) => {
            if !matches!(error, LlmError::Cancelled) {
                sink.on_error(&error).await;
            }
            call.abort(&error);
            return Err(error);
        }
    };

    let events = sse_frames(response).flat_map(move |frame| {
        let items: Vec<Result<StreamEvent, LlmError>> = match frame {
            Ok((event, data)) => match translate(&event, &data) {
                Ok(events) => events.into_iter().map(Ok).collect(),
                Err(error) => vec![Err(error)],
            },
            Err(error) => vec![Err(error)],
        };
        futures_util::stream::iter(items)
    });

    drive(Box::pin(events), call, context, sink).await
}

#[cfg(test)]
pub(crate) mod testing {
    use serde_json::json;
    use switchboard_core::params::keys;
    use switchboard_core::{Credential, ModelParameters};
    use url::Url;
    use wiremock::MockServer;

    use crate::registry::ProviderSettings;

    pub(crate) use crate::stream::driver::tests::RecordingSink;

    /// Settings pointing an adapter at a mock server
    pub(crate) fn settings(server: &MockServer) -> ProviderSettings {
        ProviderSettings {
            base_url: Some(Url::parse(&server.uri()).unwrap()),
            ..ProviderSettings::default()
        }
    }

    pub(crate) fn credential() -> Credential {
        Credential::new(42, json!({"key": "test-key"}))
    }

    pub(crate) fn model(name: &str) -> ModelParameters {
        ModelParameters::new().with(keys::NAME, name)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use switchboard_core::Credential;

    use super::*;

    #[test]
    fn credential_base_url_wins() {
        let credential = Credential::new(1, json!({"base_url": "http://vault.local/v1"}))
            .resolve()
            .unwrap();
        let settings = ProviderSettings {
            base_url: Some(Url::parse("http://config.local").unwrap()),
            ..ProviderSettings::default()
        };

        let url = base_url(&credential, &settings, "https://api.example.com").unwrap();
        assert_eq!(endpoint(&url, "/chat/completions"), "http://vault.local/v1/chat/completions");

        let fallback = base_url(&ResolvedCredential::default(), &ProviderSettings::default(), "https://api.example.com/v1/").unwrap();
        assert_eq!(endpoint(&fallback, "models"), "https://api.example.com/v1/models");
    }

    #[test]
    fn missing_model_name_is_invalid() {
        let err = model_name(&ModelParameters::new()).unwrap_err();
        assert!(matches!(err, LlmError::InvalidRequest(_)));
    }
}
