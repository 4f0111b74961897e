//! Cohere v2 adapter: chat, embed and rerank

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use secrecy::ExposeSecret;
use switchboard_core::{
    ChatCompletionOptions, Credential, Embedding, EmbeddingOptions, IndexedContent, Message, ModelParameters,
    RequestContext, Reranking, RerankingOptions, ResolvedCredential,
};
use url::Url;

use super::{endpoint, exchange, fields, model_name, run_stream};
use crate::call::Call;
use crate::caller::{
    EmbeddingCaller, LargeLanguageCaller, Provider, RerankingCaller, StreamSink, StreamingCaller, VerificationStatus,
    Verifier,
};
use crate::convert::cohere::{
    build_embed_request, build_request, build_rerank_request, frame_events, parse_embeddings, parse_rerankings,
    parse_response,
};
use crate::convert::ensure_history;
use crate::error::{CallResult, LlmError};
use crate::protocol::cohere::{
    CohereChatRequest, CohereChatResponse, CohereCheckApiKeyResponse, CohereEmbedResponse, CohereRerankResponse,
};
use crate::registry::ProviderSettings;
use crate::transport::classify;

/// Default Cohere API base URL
const DEFAULT_BASE_URL: &str = "https://api.cohere.com";

/// Cohere adapter
pub struct CohereProvider {
    name: String,
    client: Client,
    credential: ResolvedCredential,
    settings: ProviderSettings,
}

impl CohereProvider {
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

    /// Authorized POST to `path`
    fn post(&self, path: &str) -> Result<RequestBuilder, LlmError> {
        let key = self.credential.secret(fields::KEY)?;
        let url = endpoint(&self.base_url()?, path);
        Ok(self.client.post(url).bearer_auth(key.expose_secret()))
    }

    fn chat_request(
        &self,
        history: &[Message],
        options: &ChatCompletionOptions,
        stream: bool,
    ) -> Result<(RequestBuilder, CohereChatRequest), LlmError> {
        ensure_history(history)?;
        let model = model_name(&options.model_parameters)?;
        let request = build_request(model, history, options, stream);
        Ok((self.post("v2/chat")?.json(&request), request))
    }
}

#[async_trait]
impl LargeLanguageCaller for CohereProvider {
    async fn chat_completion(&self, history: &[Message], options: &ChatCompletionOptions) -> CallResult<Message> {
        let mut call = Call::start(&self.name, options.request_id, &options.hooks);
        let (builder, request) = match self.chat_request(history, options, false) {
            Ok(prepared) => prepared,
            Err(e) => return Err(call.fail(e)),
        };

        call.dispatch(&request);
        let outcome = exchange::<CohereChatResponse>(&self.name, builder, self.settings.timeout)
            .await
            .map(|(response, raw)| {
                if let Some(usage) = &response.usage {
                    call.metrics_mut().add_usage(usage);
                }
                (Message::Assistant(parse_response(response)), raw)
            });
        call.settle(outcome)
    }
}

#[async_trait]
impl StreamingCaller for CohereProvider {
    async fn stream_chat_completion(
        &self,
        history: &[Message],
        options: &ChatCompletionOptions,
        context: &RequestContext,
        sink: &mut dyn StreamSink,
    ) -> Result<(), LlmError> {
        let mut call = Call::start(&self.name, options.request_id, &options.hooks);
        let (builder, request) = match self.chat_request(history, options, true) {
            Ok(prepared) => prepared,
            Err(e) => {
                call.abort(&e);
                return Err(e);
            }
        };

        call.dispatch(&request);
        run_stream(call, &self.name, builder, self.settings.timeout, context, sink, |_, data| {
            frame_events(data)
        })
        .await
    }
}

#[async_trait]
impl EmbeddingCaller for CohereProvider {
    async fn embedding(&self, content: &IndexedContent, options: &EmbeddingOptions) -> CallResult<Vec<Embedding>> {
        let mut call = Call::start(&self.name, options.request_id, &options.hooks);
        let params = &options.model_parameters;
        let prepared = model_name(params).and_then(|model| {
            let request = build_embed_request(model, content, params);
            Ok((self.post("v2/embed")?.json(&request), request))
        });
        let (builder, request) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => return Err(call.fail(e)),
        };

        call.dispatch(&request);
        let outcome = match exchange::<CohereEmbedResponse>(&self.name, builder, self.settings.timeout).await {
            Ok((response, raw)) => {
                if let Some(meta) = &response.meta {
                    call.metrics_mut().add_usage(meta);
                }
                parse_embeddings(content, response).map(|embeddings| (embeddings, raw))
            }
            Err(e) => Err(e),
        };
        call.settle(outcome)
    }
}

#[async_trait]
impl RerankingCaller for CohereProvider {
    async fn reranking(
        &self,
        query: &str,
        documents: &IndexedContent,
        options: &RerankingOptions,
    ) -> CallResult<Vec<Reranking>> {
        let mut call = Call::start(&self.name, options.request_id, &options.hooks);
        let params = &options.model_parameters;
        let prepared = model_name(params).and_then(|model| {
            let request = build_rerank_request(model, query, documents, params);
            Ok((self.post("v2/rerank")?.json(&request), request))
        });
        let (builder, request) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => return Err(call.fail(e)),
        };

        call.dispatch(&request);
        let outcome = match exchange::<CohereRerankResponse>(&self.name, builder, self.settings.timeout).await {
            Ok((response, raw)) => {
                if let Some(meta) = &response.meta {
                    call.metrics_mut().add_usage(meta);
                }
                parse_rerankings(documents, response).map(|rerankings| (rerankings, raw))
            }
            Err(e) => Err(e),
        };
        call.settle(outcome)
    }
}

#[async_trait]
impl Verifier for CohereProvider {
    /// `check-api-key` answers 200 with `valid: false` for unknown keys
    async fn verify_credential(&self, _parameters: &ModelParameters) -> Result<VerificationStatus, LlmError> {
        let builder = self.post("v1/check-api-key")?;
        let timeout = self.settings.timeout;

        let response = tokio::time::timeout(timeout, builder.send())
            .await
            .map_err(|_| LlmError::Timeout(timeout))?
            .map_err(|e| {
                tracing::error!(provider = %self.name, error = %e, "credential check request failed");
                LlmError::transport(e)
            })?;

        if !response.status().is_success() {
            return classify(&self.name, response).await;
        }

        let check: CohereCheckApiKeyResponse = response
            .json()
            .await
            .map_err(|e| LlmError::transport(format!("failed to parse response: {e}")))?;

        Ok(if check.valid {
            VerificationStatus::Valid
        } else {
            VerificationStatus::Invalid
        })
    }
}

impl Provider for CohereProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn chat_caller(&self) -> Option<&dyn LargeLanguageCaller> {
        Some(self)
    }

    fn streaming_caller(&self) -> Option<&dyn StreamingCaller> {
        Some(self)
    }

    fn embedding_caller(&self) -> Option<&dyn EmbeddingCaller> {
        Some(self)
    }

    fn reranking_caller(&self) -> Option<&dyn RerankingCaller> {
        Some(self)
    }

    fn verifier(&self) -> &dyn Verifier {
        self
    }
}
