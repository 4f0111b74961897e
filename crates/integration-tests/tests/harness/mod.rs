//! Shared fixtures: a gateway wired to a `wiremock` vendor double

#![allow(dead_code)]

pub mod frames;
pub mod vendor;

use std::sync::Arc;

use serde_json::json;
use switchboard_audit::{AuditHooks, InMemoryAuditStore, InMemoryObjectStore};
use switchboard_config::Config;
use switchboard_core::{ClientSource, Credential, RequestContext};
use switchboard_gateway::{Authenticator, Gateway, Principal, StaticAuthenticator};
use switchboard_llm::{ProviderRegistry, ProviderSettings};
use wiremock::MockServer;

pub const ORGANIZATION_ID: u64 = 1;
pub const PROJECT_ID: u64 = 2;
pub const CREDENTIAL_ID: u64 = 42;

/// Gateway under test with in-memory audit stores
pub struct TestGateway {
    pub gateway: Gateway,
    pub records: Arc<InMemoryAuditStore>,
    pub objects: Arc<InMemoryObjectStore>,
    pub vendor: MockServer,
}

impl TestGateway {
    /// Gateway authenticating every caller as project 2 of organization 1
    pub async fn start() -> Self {
        Self::start_with(Arc::new(StaticAuthenticator::new(Principal::new(ORGANIZATION_ID, PROJECT_ID)))).await
    }

    pub async fn start_with(authenticator: Arc<dyn Authenticator>) -> Self {
        let vendor = MockServer::start().await;
        let config = config_for(&vendor);

        let records = Arc::new(InMemoryAuditStore::new());
        let objects = Arc::new(InMemoryObjectStore::new());
        let gateway = Gateway::builder(registry(&config), authenticator)
            .audit(AuditHooks::new(records.clone(), objects.clone()))
            .node(config.gateway.node)
            .build();

        Self {
            gateway,
            records,
            objects,
            vendor,
        }
    }

    /// Wait for detached audit writes to land
    pub async fn drain_audit(&self) {
        if let Some(audit) = self.gateway.audit() {
            audit.shutdown().await;
        }
    }
}

/// Configuration pointing every chat-capable adapter used here at `vendor`
fn config_for(vendor: &MockServer) -> Config {
    let raw = format!(
        r#"
[gateway]
request_timeout = "10s"
source = "integration"
environment = "test"
region = "local"
node = 3

[providers.openai]
base_url = "{uri}"

[providers.cohere]
base_url = "{uri}"
timeout = "5s"

[providers.voyageai]
base_url = "{uri}"
"#,
        uri = vendor.uri()
    );
    Config::parse(&raw).unwrap()
}

fn registry(config: &Config) -> ProviderRegistry {
    let mut registry = ProviderRegistry::with_defaults();
    registry.set_default_timeout(config.gateway.request_timeout);
    for (tag, provider) in &config.providers {
        registry.configure(
            tag.as_str(),
            ProviderSettings {
                base_url: provider.base_url.clone(),
                timeout: config.provider_timeout(tag),
            },
        );
    }
    registry
}

pub fn credential() -> Credential {
    Credential::new(CREDENTIAL_ID, json!({"key": "test-key"}))
}

pub fn context() -> RequestContext {
    RequestContext::empty().with_client(ClientSource {
        source: "integration".to_owned(),
        environment: "test".to_owned(),
        region: "local".to_owned(),
    })
}
