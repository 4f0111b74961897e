//! Replicate predictions adapter
//!
//! Language models on Replicate take a flattened prompt. A prediction is
//! created with `Prefer: wait` and polled until it settles if the vendor
//! hands it back unfinished.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use secrecy::ExposeSecret;
use serde_json::Value;
use switchboard_core::{ChatCompletionOptions, Credential, Message, ModelParameters, ResolvedCredential};
use url::Url;

use super::{endpoint, exchange, fields, model_name};
use crate::call::Call;
use crate::caller::{LargeLanguageCaller, Provider, VerificationStatus, Verifier};
use crate::convert::ensure_history;
use crate::convert::replicate::{build_input, parse_output};
use crate::error::{CallResult, LlmError};
use crate::protocol::replicate::{ReplicatePrediction, ReplicatePredictionRequest};
use crate::registry::ProviderSettings;
use crate::transport::verify;

/// Default Replicate API base URL
const DEFAULT_BASE_URL: &str = "https://api.replicate.com/v1";

/// Delay between polls of an unfinished prediction
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Where a prediction for `model` is created, and the version it pins
///
/// `owner/name:version` pins a community model version; `owner/name`
/// addresses an official model by path.
fn prediction_target(model: &str) -> (String, Option<String>) {
    match model.split_once(':') {
        Some((_, version)) => ("predictions".to_owned(), Some(version.to_owned())),
        None => (format!("models/{model}/predictions"), None),
    }
}

/// Replicate adapter
pub struct ReplicateProvider {
    name: String,
    client: Client,
    credential: ResolvedCredential,
    settings: ProviderSettings,
}

impl ReplicateProvider {
    pub fn new(name: &str, credential: &Credential, settings: &ProviderSettings) -> Result<Self, LlmError> {
        Ok(Self {
            name: name.to_owned(),
            client: Client::new(),
            credential: credential.resolve()?,
            settings: settings.clone(),
        })
    }

    fn base_url(&self) -> Result<Url, LlmError> {
        super::base_url(&self.credential, &self.settings, DEFAULT_BASE_URL)
    }

    fn authorize(&self, builder: RequestBuilder) -> Result<RequestBuilder, LlmError> {
        let key = self.credential.secret(fields::KEY)?;
        Ok(builder.bearer_auth(key.expose_secret()))
    }

    fn prediction_request(
        &self,
        history: &[Message],
        params: &ModelParameters,
    ) -> Result<(RequestBuilder, ReplicatePredictionRequest), LlmError> {
        ensure_history(history)?;
        let model = model_name(params)?;
        let (path, version) = prediction_target(&model);
        let request = ReplicatePredictionRequest {
            version,
            input: build_input(history, params),
        };
        let builder = self
            .authorize(self.client.post(endpoint(&self.base_url()?, &path)))?
            .header("Prefer", "wait")
            .json(&request);
        Ok((builder, request))
    }

    /// Create the prediction and poll it until it leaves the running states
    ///
    /// The whole exchange, polling included, is bounded by the call timeout.
    async fn run_prediction(&self, builder: RequestBuilder) -> Result<(ReplicatePrediction, Value), LlmError> {
        let timeout = self.settings.timeout;
        let run = async {
            let (mut prediction, mut raw) = exchange::<ReplicatePrediction>(&self.name, builder, timeout).await?;
            while matches!(prediction.status.as_str(), "starting" | "processing") {
                let poll = prediction
                    .urls
                    .as_ref()
                    .and_then(|urls| urls.get.clone())
                    .ok_or_else(|| LlmError::transport(format!("prediction {} has no poll URL", prediction.id)))?;
                tracing::debug!(provider = %self.name, prediction = %prediction.id, status = %prediction.status, "polling prediction");
                tokio::time::sleep(POLL_INTERVAL).await;
                (prediction, raw) = exchange(&self.name, self.authorize(self.client.get(poll))?, timeout).await?;
            }
            Ok::<_, LlmError>((prediction, raw))
        };

        tokio::time::timeout(timeout, run)
            .await
            .map_err(|_| LlmError::Timeout(timeout))?
    }
}

/// Settled prediction as a result: only `succeeded` carries output
fn settled(prediction: ReplicatePrediction) -> Result<ReplicatePrediction, LlmError> {
    match prediction.status.as_str() {
        "succeeded" => Ok(prediction),
        status => {
            let detail = match &prediction.error {
                Some(Value::String(message)) => message.clone(),
                Some(other) => other.to_string(),
                None => "no error detail".to_owned(),
            };
            Err(LlmError::transport(format!("prediction {} {status}: {detail}", prediction.id)))
        }
    }
}

#[async_trait]
impl LargeLanguageCaller for ReplicateProvider {
    async fn chat_completion(&self, history: &[Message], options: &ChatCompletionOptions) -> CallResult<Message> {
        let mut call = Call::start(&self.name, options.request_id, &options.hooks);
        let (builder, request) = match self.prediction_request(history, &options.model_parameters) {
            Ok(prepared) => prepared,
            Err(e) => return Err(call.fail(e)),
        };

        call.dispatch(&request);
        let outcome = match self.run_prediction(builder).await {
            Ok((prediction, raw)) => settled(prediction).map(|prediction| {
                if let Some(metrics) = &prediction.metrics {
                    call.metrics_mut().add_usage(metrics);
                }
                (Message::Assistant(parse_output(prediction.output)), raw)
            }),
            Err(e) => Err(e),
        };
        call.settle(outcome)
    }
}

#[async_trait]
impl Verifier for ReplicateProvider {
    async fn verify_credential(&self, _parameters: &ModelParameters) -> Result<VerificationStatus, LlmError> {
        let url = endpoint(&self.base_url()?, "account");
        let builder = self.authorize(self.client.get(url))?;
        verify(&self.name, builder, self.settings.timeout).await
    }
}

impl Provider for ReplicateProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn chat_caller(&self) -> Option<&dyn LargeLanguageCaller> {
        Some(self)
    }

    fn verifier(&self) -> &dyn Verifier {
        self
    }
}
