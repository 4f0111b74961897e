//! Voyage AI adapter: embeddings and rerank only

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use secrecy::ExposeSecret;
use switchboard_core::params::keys;
use switchboard_core::{
    Credential, Embedding, EmbeddingOptions, IndexedContent, ModelParameters, Reranking, RerankingOptions,
    ResolvedCredential, TokenUsage, UsageMetrics,
};
use url::Url;

use super::{endpoint, exchange, fields, model_name};
use crate::call::Call;
use crate::caller::{EmbeddingCaller, Provider, RerankingCaller, VerificationStatus, Verifier};
use crate::error::{CallResult, LlmError};
use crate::ordering::{ordered_texts, restore_embeddings, restore_rerankings};
use crate::protocol::voyage::{
    VoyageEmbeddingRequest, VoyageEmbeddingResponse, VoyageRerankRequest, VoyageRerankResponse, VoyageUsage,
};
use crate::registry::ProviderSettings;
use crate::transport::verify;

/// Default Voyage AI API base URL
const DEFAULT_BASE_URL: &str = "https://api.voyageai.com/v1";

/// Model embedded against when verification names none
const VERIFY_MODEL: &str = "voyage-3-lite";

impl UsageMetrics for VoyageUsage {
    fn token_usage(&self) -> TokenUsage {
        TokenUsage {
            input: self.total_tokens,
            total: self.total_tokens,
            ..TokenUsage::default()
        }
    }
}

/// Voyage AI adapter
pub struct VoyageProvider {
    name: String,
    client: Client,
    credential: ResolvedCredential,
    settings: ProviderSettings,
}

impl VoyageProvider {
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

    fn post(&self, path: &str) -> Result<RequestBuilder, LlmError> {
        let key = self.credential.secret(fields::KEY)?;
        let url = endpoint(&self.base_url()?, path);
        Ok(self.client.post(url).bearer_auth(key.expose_secret()))
    }
}

fn embedding_request(model: String, input: Vec<String>, params: &ModelParameters) -> VoyageEmbeddingRequest {
    VoyageEmbeddingRequest {
        input,
        model,
        input_type: params.string(keys::INPUT_TYPE),
        output_dimension: params.unsigned(keys::DIMENSIONS),
    }
}

#[async_trait]
impl EmbeddingCaller for VoyageProvider {
    async fn embedding(&self, content: &IndexedContent, options: &EmbeddingOptions) -> CallResult<Vec<Embedding>> {
        let mut call = Call::start(&self.name, options.request_id, &options.hooks);
        let params = &options.model_parameters;
        let prepared = model_name(params).and_then(|model| {
            let request = embedding_request(model, ordered_texts(content), params);
            Ok((self.post("embeddings")?.json(&request), request))
        });
        let (builder, request) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => return Err(call.fail(e)),
        };

        call.dispatch(&request);
        let outcome = match exchange::<VoyageEmbeddingResponse>(&self.name, builder, self.settings.timeout).await {
            Ok((response, raw)) => {
                if let Some(usage) = &response.usage {
                    call.metrics_mut().add_usage(usage);
                }
                restore_embeddings(content, response.data.into_iter().map(|d| (d.index, d.embedding)))
                    .map(|embeddings| (embeddings, raw))
            }
            Err(e) => Err(e),
        };
        call.settle(outcome)
    }
}

#[async_trait]
impl RerankingCaller for VoyageProvider {
    async fn reranking(
        &self,
        query: &str,
        documents: &IndexedContent,
        options: &RerankingOptions,
    ) -> CallResult<Vec<Reranking>> {
        let mut call = Call::start(&self.name, options.request_id, &options.hooks);
        let params = &options.model_parameters;
        let prepared = model_name(params).and_then(|model| {
            let request = VoyageRerankRequest {
                query: query.to_owned(),
                documents: ordered_texts(documents),
                model,
                top_k: params.unsigned(keys::TOP_N),
            };
            Ok((self.post("rerank")?.json(&request), request))
        });
        let (builder, request) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => return Err(call.fail(e)),
        };

        call.dispatch(&request);
        let outcome = match exchange::<VoyageRerankResponse>(&self.name, builder, self.settings.timeout).await {
            Ok((response, raw)) => {
                if let Some(usage) = &response.usage {
                    call.metrics_mut().add_usage(usage);
                }
                restore_rerankings(documents, response.data.into_iter().map(|r| (r.index, r.relevance_score)))
                    .map(|rerankings| (rerankings, raw))
            }
            Err(e) => Err(e),
        };
        call.settle(outcome)
    }
}

#[async_trait]
impl Verifier for VoyageProvider {
    /// Embeds a single short input; Voyage has no cheaper authenticated
    /// endpoint
    async fn verify_credential(&self, parameters: &ModelParameters) -> Result<VerificationStatus, LlmError> {
        let model = parameters.model_name().unwrap_or_else(|| VERIFY_MODEL.to_owned());
        let request = embedding_request(model, vec!["ping".to_owned()], &ModelParameters::new());
        verify(&self.name, self.post("embeddings")?.json(&request), self.settings.timeout).await
    }
}

impl Provider for VoyageProvider {
    fn name(&self) -> &str {
        &self.name
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

#[cfg(test)]
mod tests {
    use serde_json::json;
    use switchboard_core::Metric;
    use switchboard_core::metrics::names;
    use wiremock::matchers::{body_json, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::provider::testing::{credential, model, settings};

    fn provider(server: &MockServer) -> VoyageProvider {
        VoyageProvider::new("voyageai", &credential(), &settings(server)).unwrap()
    }

    fn metric<'a>(metrics: &'a [Metric], name: &str) -> Option<&'a str> {
        metrics.iter().find(|m| m.name == name).map(|m| m.value.as_str())
    }

    #[tokio::test]
    async fn rerank_results_come_back_in_index_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rerank"))
            .and(body_json(json!({
                "query": "capital of France",
                "documents": ["Berlin", "Madrid", "Paris"],
                "model": "rerank-2"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"index": 2, "relevance_score": 0.92},
                    {"index": 0, "relevance_score": 0.11},
                    {"index": 1, "relevance_score": 0.07}
                ],
                "usage": {"total_tokens": 21}
            })))
            .mount(&server)
            .await;

        let documents: IndexedContent = [(0, "Berlin"), (1, "Madrid"), (2, "Paris")]
            .into_iter()
            .map(|(i, t)| (i, t.to_owned()))
            .collect();
        let options = RerankingOptions {
            model_parameters: model("rerank-2"),
            ..RerankingOptions::default()
        };
        let completion = provider(&server)
            .reranking("capital of France", &documents, &options)
            .await
            .unwrap();

        let order: Vec<u32> = completion.data.iter().map(|r| r.index).collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert_eq!(completion.data[2].content, "Paris");
        assert!((completion.data[2].relevance_score - 0.92).abs() < f64::EPSILON);
        assert_eq!(metric(&completion.metrics, names::TOTAL_TOKEN), Some("21"));
    }

    #[tokio::test]
    async fn embeddings_send_input_type_and_dimension() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(body_partial_json(json!({"input_type": "query", "output_dimension": 256})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"index": 0, "embedding": [0.5, 0.5]}],
                "usage": {"total_tokens": 3}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let content: IndexedContent = [(7, "hello".to_owned())].into_iter().collect();
        let options = EmbeddingOptions {
            model_parameters: model("voyage-3")
                .with(keys::INPUT_TYPE, "query")
                .with(keys::DIMENSIONS, 256),
            ..EmbeddingOptions::default()
        };
        let completion = provider(&server).embedding(&content, &options).await.unwrap();

        assert_eq!(completion.data[0].index, 7);
        assert_eq!(metric(&completion.metrics, names::INPUT_TOKEN), Some("3"));
    }

    #[tokio::test]
    async fn verify_embeds_one_input() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(body_partial_json(json!({"input": ["ping"], "model": VERIFY_MODEL})))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let status = provider(&server)
            .verify_credential(&ModelParameters::new())
            .await
            .unwrap();

        assert_eq!(status, VerificationStatus::Invalid);
        assert!(provider(&server).chat_caller().is_none());
    }
}
