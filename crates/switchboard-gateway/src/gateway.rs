//! Request orchestration
//!
//! Every entry point authenticates the caller, allocates a request id,
//! stamps routing metadata onto the request, builds the adapter for the
//! provider tag and makes exactly one adapter call. Adapter failures come
//! back as `success: false` envelopes, never as transport errors.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use indexmap::IndexMap;
use switchboard_audit::{AuditHooks, AuditTarget, RequestScope};
use switchboard_core::params::keys;
use switchboard_core::{
    ChatCompletionOptions, ClientSource, Credential, Embedding, EmbeddingOptions, Hooks, Message, ModelParameters,
    RequestContext, Reranking, RerankingOptions,
};
use switchboard_llm::{CallResult, LlmError, Provider, ProviderRegistry, StreamSink, VerificationStatus};

use crate::auth::{Authenticator, Principal};
use crate::envelope::Envelope;
use crate::error::GatewayError;
use crate::id::RequestIdGenerator;
use crate::request::{ChatRequest, EmbeddingRequest, RerankingRequest, VerifyCredentialRequest, additional};

/// Delivers streamed response frames to the client
#[async_trait]
pub trait ResponseSink: Send {
    async fn send(&mut self, frame: Envelope<Message>) -> anyhow::Result<()>;
}

/// The gateway orchestrator
///
/// Cheap to clone; clones share the registry, authenticator and audit hooks.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    registry: ProviderRegistry,
    authenticator: Arc<dyn Authenticator>,
    audit: Option<AuditHooks>,
    ids: RequestIdGenerator,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("registry", &self.inner.registry)
            .field("audit", &self.inner.audit)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Gateway`]
pub struct GatewayBuilder {
    registry: ProviderRegistry,
    authenticator: Arc<dyn Authenticator>,
    audit: Option<AuditHooks>,
    node: u16,
}

impl GatewayBuilder {
    /// Persist every call through these audit hooks
    #[must_use]
    pub fn audit(mut self, audit: AuditHooks) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Node id mixed into request ids
    #[must_use]
    pub const fn node(mut self, node: u16) -> Self {
        self.node = node;
        self
    }

    pub fn build(self) -> Gateway {
        Gateway {
            inner: Arc::new(GatewayInner {
                registry: self.registry,
                authenticator: self.authenticator,
                audit: self.audit,
                ids: RequestIdGenerator::new(self.node),
            }),
        }
    }
}

/// A request that passed authentication and has an adapter
struct Dispatch {
    principal: Principal,
    request_id: u64,
    provider: Arc<dyn Provider>,
}

impl Dispatch {
    fn unsupported<T>(&self, operation: &'static str) -> Envelope<T> {
        let error = unsupported(self.provider.name(), operation);
        Envelope::failure(self.request_id, &error.into(), Vec::new())
    }

    fn settle<T>(&self, result: CallResult<T>) -> Envelope<T> {
        match result {
            Ok(completion) => Envelope::success(self.request_id, completion.data, completion.metrics),
            Err(failed) => {
                tracing::warn!(
                    provider = %self.provider.name(),
                    request_id = self.request_id,
                    error = %failed.error,
                    "vendor call failed"
                );
                Envelope::failure(self.request_id, &failed.error.into(), failed.metrics)
            }
        }
    }
}

impl Gateway {
    pub fn builder(registry: ProviderRegistry, authenticator: Arc<dyn Authenticator>) -> GatewayBuilder {
        GatewayBuilder {
            registry,
            authenticator,
            audit: None,
            node: 0,
        }
    }

    pub fn audit(&self) -> Option<&AuditHooks> {
        self.inner.audit.as_ref()
    }

    /// Unary chat completion
    pub async fn chat(&self, tag: &str, mut request: ChatRequest, context: &RequestContext) -> Envelope<Message> {
        tracing::info!(provider = tag, "chat request");
        let dispatch = match self
            .dispatch(tag, &request.credential, &request.model_parameters, &mut request.additional_data, context)
            .await
        {
            Ok(dispatch) => dispatch,
            Err(rejected) => return rejected,
        };
        let Some(caller) = dispatch.provider.chat_caller() else {
            return dispatch.unsupported("chat");
        };

        let (hooks, _scope) = self.hooks(
            dispatch.principal,
            tag,
            request.credential.id,
            dispatch.request_id,
            &request.additional_data,
        );
        let options = ChatCompletionOptions {
            request_id: dispatch.request_id,
            model_parameters: request.model_parameters,
            tool_definitions: request.tool_definitions,
            hooks,
        };
        dispatch.settle(caller.chat_completion(&request.conversations, &options).await)
    }

    /// Streamed chat completion
    ///
    /// Frames go to `transport`: one per token, then the complete message
    /// with metrics. A failure after authentication is sent as a frame too.
    /// Only an unauthenticated caller or a broken transport is an `Err`.
    pub async fn stream_chat(
        &self,
        tag: &str,
        request: ChatRequest,
        context: &RequestContext,
        transport: &mut dyn ResponseSink,
    ) -> Result<(), GatewayError> {
        let Some(principal) = self.authorize(context).await else {
            tracing::error!(provider = tag, "unauthenticated request for stream chat");
            return Err(GatewayError::Unauthenticated);
        };
        self.stream_one(principal, tag, request, context, transport).await
    }

    /// Bidirectional chat session
    ///
    /// The caller is authenticated once, then each request from `requests`
    /// is streamed in turn over the same `transport`. A failed request is
    /// reported in a frame and the session keeps serving. The session ends
    /// when `requests` ends or the client cancels.
    pub async fn chat_session<S>(
        &self,
        tag: &str,
        mut requests: S,
        context: &RequestContext,
        transport: &mut dyn ResponseSink,
    ) -> Result<(), GatewayError>
    where
        S: Stream<Item = anyhow::Result<ChatRequest>> + Send + Unpin,
    {
        let Some(principal) = self.authorize(context).await else {
            tracing::error!(provider = tag, "unauthenticated request for chat session");
            return Err(GatewayError::Unauthenticated);
        };
        tracing::info!(provider = tag, "chat session opened");

        loop {
            let next = tokio::select! {
                biased;
                () = context.cancellation.cancelled() => break,
                next = requests.next() => next,
            };
            let Some(next) = next else { break };
            let request = next.map_err(|e| {
                tracing::error!(provider = tag, error = %e, "failed to receive chat request");
                GatewayError::Internal(e.context("failed to receive chat request"))
            })?;
            self.stream_one(principal, tag, request, context, transport).await?;
        }

        tracing::info!(provider = tag, "chat session closed");
        Ok(())
    }

    pub async fn embedding(
        &self,
        tag: &str,
        mut request: EmbeddingRequest,
        context: &RequestContext,
    ) -> Envelope<Vec<Embedding>> {
        tracing::info!(provider = tag, inputs = request.content.len(), "embedding request");
        let dispatch = match self
            .dispatch(tag, &request.credential, &request.model_parameters, &mut request.additional_data, context)
            .await
        {
            Ok(dispatch) => dispatch,
            Err(rejected) => return rejected,
        };
        let Some(caller) = dispatch.provider.embedding_caller() else {
            return dispatch.unsupported("embedding");
        };

        let (hooks, _scope) = self.hooks(
            dispatch.principal,
            tag,
            request.credential.id,
            dispatch.request_id,
            &request.additional_data,
        );
        let options = EmbeddingOptions {
            request_id: dispatch.request_id,
            model_parameters: request.model_parameters,
            hooks,
        };
        dispatch.settle(caller.embedding(&request.content, &options).await)
    }

    pub async fn reranking(
        &self,
        tag: &str,
        mut request: RerankingRequest,
        context: &RequestContext,
    ) -> Envelope<Vec<Reranking>> {
        tracing::info!(provider = tag, documents = request.content.len(), "reranking request");
        let dispatch = match self
            .dispatch(tag, &request.credential, &request.model_parameters, &mut request.additional_data, context)
            .await
        {
            Ok(dispatch) => dispatch,
            Err(rejected) => return rejected,
        };
        let Some(caller) = dispatch.provider.reranking_caller() else {
            return dispatch.unsupported("reranking");
        };

        let (hooks, _scope) = self.hooks(
            dispatch.principal,
            tag,
            request.credential.id,
            dispatch.request_id,
            &request.additional_data,
        );
        let options = RerankingOptions {
            request_id: dispatch.request_id,
            model_parameters: request.model_parameters,
            hooks,
        };
        dispatch.settle(caller.reranking(&request.query, &request.content, &options).await)
    }

    /// Check a credential against the vendor; not audited
    pub async fn verify_credential(
        &self,
        tag: &str,
        request: VerifyCredentialRequest,
        context: &RequestContext,
    ) -> Envelope<VerificationStatus> {
        let VerifyCredentialRequest {
            credential,
            model_parameters,
        } = request;
        tracing::info!(provider = tag, credential_id = credential.id, "verify credential request");
        let mut additional_data = IndexMap::new();
        let dispatch = match self
            .dispatch(tag, &credential, &model_parameters, &mut additional_data, context)
            .await
        {
            Ok(dispatch) => dispatch,
            Err(rejected) => return rejected,
        };

        match dispatch.provider.verifier().verify_credential(&model_parameters).await {
            Ok(status) => Envelope::success(dispatch.request_id, status, Vec::new()),
            Err(e) => {
                tracing::warn!(provider = tag, error = %e, "credential verification failed");
                Envelope::failure(dispatch.request_id, &e.into(), Vec::new())
            }
        }
    }

    /// Principal of the caller, if it has a project
    async fn authorize(&self, context: &RequestContext) -> Option<Principal> {
        self.inner
            .authenticator
            .authorize(context)
            .await
            .filter(Principal::has_project)
    }

    async fn dispatch<T>(
        &self,
        tag: &str,
        credential: &Credential,
        parameters: &ModelParameters,
        additional_data: &mut IndexMap<String, String>,
        context: &RequestContext,
    ) -> Result<Dispatch, Envelope<T>> {
        let Some(principal) = self.authorize(context).await else {
            tracing::error!(provider = tag, "unauthenticated request for invoke");
            return Err(Envelope::failure(0, &GatewayError::Unauthenticated, Vec::new()));
        };

        let request_id = self.inner.ids.next_id();
        stamp_additional_data(additional_data, tag, parameters, &context.client);

        let provider = self.inner.registry.create(tag, credential).map_err(|e| {
            tracing::warn!(provider = tag, request_id, error = %e, "failed to build adapter");
            Envelope::failure(request_id, &e.into(), Vec::new())
        })?;

        Ok(Dispatch {
            principal,
            request_id,
            provider,
        })
    }

    async fn stream_one(
        &self,
        principal: Principal,
        tag: &str,
        mut request: ChatRequest,
        context: &RequestContext,
        transport: &mut dyn ResponseSink,
    ) -> Result<(), GatewayError> {
        let request_id = self.inner.ids.next_id();
        stamp_additional_data(&mut request.additional_data, tag, &request.model_parameters, &context.client);

        let provider = match self.inner.registry.create(tag, &request.credential) {
            Ok(provider) => provider,
            Err(e) => return reject(transport, request_id, e).await,
        };
        let Some(caller) = provider.streaming_caller() else {
            return reject(transport, request_id, unsupported(provider.name(), "streaming")).await;
        };

        let (hooks, _scope) = self.hooks(principal, tag, request.credential.id, request_id, &request.additional_data);
        let options = ChatCompletionOptions {
            request_id,
            model_parameters: request.model_parameters,
            tool_definitions: request.tool_definitions,
            hooks,
        };

        let mut sink = FrameSink {
            request_id,
            transport,
            reported: false,
        };
        match caller
            .stream_chat_completion(&request.conversations, &options, context, &mut sink)
            .await
        {
            Ok(()) => Ok(()),
            Err(LlmError::Cancelled) => {
                tracing::debug!(provider = tag, request_id, "stream cancelled by client");
                Ok(())
            }
            Err(e) if sink.reported => {
                tracing::warn!(provider = tag, request_id, error = %e, "vendor stream failed");
                Ok(())
            }
            Err(e) => {
                let error = GatewayError::from(e);
                tracing::warn!(provider = tag, request_id, error = %error, "failed to process streamed chat request");
                sink.transport
                    .send(Envelope::internal(request_id, &error))
                    .await
                    .map_err(GatewayError::Internal)
            }
        }
    }

    /// Audit hooks for one call; no-op hooks when auditing is off
    fn hooks(
        &self,
        principal: Principal,
        tag: &str,
        credential_id: u64,
        request_id: u64,
        additional_data: &IndexMap<String, String>,
    ) -> (Hooks, Option<RequestScope>) {
        let Some(audit) = &self.inner.audit else {
            return (Hooks::noop(), None);
        };
        let (hooks, scope) = audit.hooks_for(AuditTarget {
            request_id,
            organization_id: principal.current_organization_id(),
            project_id: principal.current_project_id(),
            credential_id,
            provider: tag.to_owned(),
            extras: additional_data.clone(),
        });
        (hooks, Some(scope))
    }
}

/// Adapts the transport to the adapter's stream callbacks
struct FrameSink<'a> {
    request_id: u64,
    transport: &'a mut dyn ResponseSink,
    /// An error frame was already sent for this request
    reported: bool,
}

#[async_trait]
impl StreamSink for FrameSink<'_> {
    async fn on_token(&mut self, token: Message) -> anyhow::Result<()> {
        self.transport
            .send(Envelope::success(self.request_id, token, Vec::new()))
            .await
    }

    async fn on_complete(&mut self, message: Message, metrics: Vec<switchboard_core::Metric>) -> anyhow::Result<()> {
        self.transport
            .send(Envelope::success(self.request_id, message, metrics))
            .await
    }

    async fn on_error(&mut self, error: &LlmError) {
        self.reported = true;
        if let Err(e) = self
            .transport
            .send(Envelope::vendor_failure(self.request_id, error))
            .await
        {
            tracing::warn!(request_id = self.request_id, error = %e, "failed to send error frame");
        }
    }
}

async fn reject(transport: &mut dyn ResponseSink, request_id: u64, error: LlmError) -> Result<(), GatewayError> {
    tracing::warn!(request_id, error = %error, "rejected streamed chat request");
    transport
        .send(Envelope::failure(request_id, &error.into(), Vec::new()))
        .await
        .map_err(GatewayError::Internal)
}

fn unsupported(provider: &str, operation: &'static str) -> LlmError {
    LlmError::Unsupported {
        provider: provider.to_owned(),
        operation,
    }
}

/// Record where a request is going and where it came from
fn stamp_additional_data(
    data: &mut IndexMap<String, String>,
    tag: &str,
    parameters: &ModelParameters,
    client: &ClientSource,
) {
    data.insert(additional::PROVIDER_NAME.to_owned(), tag.to_owned());
    if let Some(name) = parameters.string(keys::NAME) {
        data.insert(additional::MODEL_NAME.to_owned(), name);
    }
    if let Some(id) = parameters.string(keys::ID) {
        data.insert(additional::MODEL_ID.to_owned(), id);
    }
    for (key, value) in [
        (additional::SOURCE, &client.source),
        (additional::ENVIRONMENT, &client.environment),
        (additional::REGION, &client.region),
    ] {
        if !value.is_empty() {
            data.insert(key.to_owned(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use switchboard_audit::{AuditStore, InMemoryAuditStore, InMemoryObjectStore};
    use switchboard_core::metrics::names;
    use switchboard_core::{Metric, MetricBuilder};
    use switchboard_llm::{CallError, Completion, LargeLanguageCaller, StreamingCaller, Verifier};

    use super::*;
    use crate::auth::StaticAuthenticator;
    use crate::error::{INTERNAL_MESSAGE, UNAUTHENTICATED_MESSAGE};

    /// Adapter that echoes the last message; no embedding or reranking
    struct Echo {
        name: String,
    }

    impl Provider for Echo {
        fn name(&self) -> &str {
            &self.name
        }

        fn chat_caller(&self) -> Option<&dyn LargeLanguageCaller> {
            Some(self)
        }

        fn streaming_caller(&self) -> Option<&dyn StreamingCaller> {
            Some(self)
        }

        fn verifier(&self) -> &dyn Verifier {
            self
        }
    }

    fn last_text(history: &[Message]) -> String {
        history.last().and_then(Message::text).unwrap_or_default()
    }

    #[async_trait]
    impl LargeLanguageCaller for Echo {
        async fn chat_completion(
            &self,
            history: &[Message],
            options: &ChatCompletionOptions,
        ) -> CallResult<Message> {
            let mut metrics = MetricBuilder::new(options.request_id);
            metrics.start();
            if history.is_empty() {
                metrics.failure();
                return Err(CallError {
                    error: LlmError::InvalidRequest("no messages in the input".to_owned()),
                    metrics: metrics.build(),
                });
            }
            options.hooks.pre(&serde_json::json!({ "prompt": last_text(history) }));
            let reply = Message::assistant(last_text(history));
            metrics.success();
            options.hooks.post(Some(&reply), metrics.build());
            Ok(Completion {
                data: reply,
                metrics: metrics.build(),
            })
        }
    }

    #[async_trait]
    impl StreamingCaller for Echo {
        async fn stream_chat_completion(
            &self,
            history: &[Message],
            options: &ChatCompletionOptions,
            _context: &RequestContext,
            sink: &mut dyn StreamSink,
        ) -> Result<(), LlmError> {
            let text = last_text(history);
            match text.as_str() {
                "setup" => return Err(LlmError::InvalidRequest("bad parameters".to_owned())),
                "fail" => {
                    let error = LlmError::Streaming("connection reset".to_owned());
                    sink.on_error(&error).await;
                    return Err(error);
                }
                "cancel" => return Err(LlmError::Cancelled),
                _ => {}
            }
            for word in text.split_inclusive(' ') {
                sink.on_token(Message::assistant(word)).await?;
            }
            let mut metrics = MetricBuilder::new(options.request_id);
            metrics.start().success();
            sink.on_complete(Message::assistant(text), metrics.build()).await?;
            Ok(())
        }
    }

    #[async_trait]
    impl Verifier for Echo {
        async fn verify_credential(&self, _parameters: &ModelParameters) -> Result<VerificationStatus, LlmError> {
            Ok(VerificationStatus::Valid)
        }
    }

    #[derive(Default)]
    struct Frames(Vec<Envelope<Message>>);

    #[async_trait]
    impl ResponseSink for Frames {
        async fn send(&mut self, frame: Envelope<Message>) -> anyhow::Result<()> {
            self.0.push(frame);
            Ok(())
        }
    }

    impl Frames {
        fn texts(&self) -> Vec<String> {
            self.0
                .iter()
                .filter_map(|f| f.data.as_ref().and_then(Message::text))
                .collect()
        }
    }

    fn registry() -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        registry.register("echo", |tag, _, _| {
            Ok(Arc::new(Echo { name: tag.to_owned() }) as Arc<dyn Provider>)
        });
        registry
    }

    fn gateway() -> Gateway {
        Gateway::builder(registry(), Arc::new(StaticAuthenticator::new(Principal::new(1, 2)))).build()
    }

    fn credential() -> Credential {
        Credential::new(3, serde_json::json!({ "key": "sk-test" }))
    }

    fn chat(text: &str) -> ChatRequest {
        ChatRequest::new(credential(), vec![Message::user(text)])
    }

    fn status(metrics: &[Metric]) -> Option<&str> {
        metrics
            .iter()
            .find(|m| m.name == names::STATUS)
            .map(|m| m.value.as_str())
    }

    #[tokio::test]
    async fn anonymous_caller_is_rejected_before_any_call() {
        let gateway = Gateway::builder(registry(), Arc::new(StaticAuthenticator::deny_all())).build();

        let envelope = gateway.chat("echo", chat("hi"), &RequestContext::empty()).await;

        assert_eq!(envelope.code, 401);
        assert_eq!(envelope.request_id, 0);
        assert_eq!(envelope.error.unwrap().human_message, UNAUTHENTICATED_MESSAGE);
    }

    #[tokio::test]
    async fn principal_without_project_is_rejected() {
        let principal = Principal {
            organization_id: 1,
            project_id: None,
        };
        let gateway = Gateway::builder(registry(), Arc::new(StaticAuthenticator::new(principal))).build();

        let mut frames = Frames::default();
        let result = gateway
            .stream_chat("echo", chat("hi"), &RequestContext::empty(), &mut frames)
            .await;

        assert!(matches!(result, Err(GatewayError::Unauthenticated)));
        assert!(frames.0.is_empty());
    }

    #[tokio::test]
    async fn chat_wraps_the_reply_with_metrics() {
        let envelope = gateway().chat("echo", chat("hello"), &RequestContext::empty()).await;

        assert_eq!(envelope.code, 200);
        assert!(envelope.request_id > 0);
        assert_eq!(envelope.data.and_then(|m| m.text()).as_deref(), Some("hello"));
        assert_eq!(status(&envelope.metrics), Some("SUCCESS"));
    }

    #[tokio::test]
    async fn failed_call_keeps_its_metrics() {
        let request = ChatRequest::new(credential(), Vec::new());
        let envelope = gateway().chat("echo", request, &RequestContext::empty()).await;

        assert_eq!(envelope.code, 400);
        assert_eq!(status(&envelope.metrics), Some("FAILED"));
        assert!(envelope.error.unwrap().error_message.contains("no messages in the input"));
    }

    #[tokio::test]
    async fn unknown_provider_is_an_error_envelope() {
        let envelope = gateway().chat("nope", chat("hi"), &RequestContext::empty()).await;

        assert_eq!(envelope.code, 400);
        assert!(envelope.error.unwrap().error_message.contains("provider not found: nope"));
    }

    #[tokio::test]
    async fn missing_capability_is_unsupported() {
        let request = EmbeddingRequest {
            credential: credential(),
            content: [(0, "a".to_owned())].into(),
            model_parameters: ModelParameters::new(),
            additional_data: IndexMap::new(),
        };
        let envelope = gateway().embedding("echo", request, &RequestContext::empty()).await;

        assert_eq!(envelope.code, 400);
        let error = envelope.error.unwrap();
        assert_eq!(error.error_message, "echo does not support embedding");
    }

    #[tokio::test]
    async fn verify_reports_the_status() {
        let request = VerifyCredentialRequest {
            credential: credential(),
            model_parameters: ModelParameters::new(),
        };
        let envelope = gateway().verify_credential("echo", request, &RequestContext::empty()).await;

        assert_eq!(envelope.data, Some(VerificationStatus::Valid));
    }

    #[test]
    fn routing_metadata_skips_empty_client_fields() {
        let mut data = IndexMap::new();
        let parameters = ModelParameters::new()
            .with(keys::NAME, "gpt-4o")
            .with(keys::ID, 42);
        let client = ClientSource {
            source: "sdk".to_owned(),
            environment: "production".to_owned(),
            region: String::new(),
        };

        stamp_additional_data(&mut data, "openai", &parameters, &client);

        let stamped: Vec<(&str, &str)> = data.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        assert_eq!(
            stamped,
            vec![
                ("provider_name", "openai"),
                ("model_name", "gpt-4o"),
                ("model_id", "42"),
                ("source", "sdk"),
                ("env", "production"),
            ]
        );
    }

    #[tokio::test]
    async fn audited_chat_is_persisted_with_its_metadata() {
        let records = Arc::new(InMemoryAuditStore::new());
        let objects = Arc::new(InMemoryObjectStore::new());
        let audit = AuditHooks::new(records.clone(), objects.clone());
        let gateway = Gateway::builder(registry(), Arc::new(StaticAuthenticator::new(Principal::new(1, 2))))
            .audit(audit.clone())
            .build();
        let context = RequestContext::empty().with_client(ClientSource {
            source: "cli".to_owned(),
            ..ClientSource::default()
        });

        let envelope = gateway.chat("echo", chat("hello"), &context).await;
        audit.shutdown().await;

        let record = records.get(1, 2, envelope.request_id).await.unwrap();
        assert_eq!(record.credential_id, 3);
        assert_eq!(record.metadata.get("provider_name").map(String::as_str), Some("echo"));
        assert_eq!(record.metadata.get("source").map(String::as_str), Some("cli"));
        let prefix = format!("1/2/3/{}", envelope.request_id);
        assert_eq!(
            objects.writes(),
            vec![format!("{prefix}__request.json"), format!("{prefix}__response.json")]
        );
    }

    #[tokio::test]
    async fn stream_sends_tokens_then_the_complete_message() {
        let mut frames = Frames::default();
        gateway()
            .stream_chat("echo", chat("Hello big world"), &RequestContext::empty(), &mut frames)
            .await
            .unwrap();

        assert_eq!(frames.texts(), vec!["Hello ", "big ", "world", "Hello big world"]);
        assert!(frames.0.iter().all(Envelope::is_success));
        let last = frames.0.last().unwrap();
        assert_eq!(status(&last.metrics), Some("SUCCESS"));
        assert!(frames.0[..3].iter().all(|f| f.metrics.is_empty()));
    }

    #[tokio::test]
    async fn session_keeps_serving_after_a_failed_request() {
        let requests = futures_util::stream::iter(vec![Ok(chat("fail")), Ok(chat("setup")), Ok(chat("ok"))]);
        let mut frames = Frames::default();

        gateway()
            .chat_session("echo", requests, &RequestContext::empty(), &mut frames)
            .await
            .unwrap();

        let codes: Vec<u16> = frames.0.iter().map(|f| f.code).collect();
        assert_eq!(codes, vec![400, 500, 200, 200]);
        assert_eq!(frames.0[1].error.as_ref().unwrap().human_message, INTERNAL_MESSAGE);
        assert_eq!(frames.texts(), vec!["ok", "ok"]);
    }

    #[tokio::test]
    async fn cancelled_stream_sends_nothing() {
        let mut frames = Frames::default();
        gateway()
            .stream_chat("echo", chat("cancel"), &RequestContext::empty(), &mut frames)
            .await
            .unwrap();

        assert!(frames.0.is_empty());
    }

    #[tokio::test]
    async fn session_ends_when_the_client_cancels() {
        let context = RequestContext::empty();
        context.cancellation.cancel();
        let mut frames = Frames::default();

        gateway()
            .chat_session("echo", futures_util::stream::pending(), &context, &mut frames)
            .await
            .unwrap();

        assert!(frames.0.is_empty());
    }

    #[tokio::test]
    async fn broken_request_stream_ends_the_session() {
        let requests = futures_util::stream::iter(vec![Ok(chat("hi")), Err(anyhow::anyhow!("socket closed"))]);
        let mut frames = Frames::default();

        let result = gateway()
            .chat_session("echo", requests, &RequestContext::empty(), &mut frames)
            .await;

        assert!(matches!(result, Err(GatewayError::Internal(_))));
        assert_eq!(frames.0.len(), 2);
    }
}
