//! Gateway assembly from configuration

use std::sync::Arc;

use secrecy::ExposeSecret;
use serde_json::{Map, Value};
use switchboard_audit::{AuditHooks, FileObjectStore, InMemoryAuditStore};
use switchboard_config::Config;
use switchboard_core::{ClientSource, Credential};
use switchboard_gateway::{Authenticator, Gateway, Principal, StaticAuthenticator};
use switchboard_llm::{ProviderRegistry, ProviderSettings};

pub fn build_gateway(config: &Config) -> Gateway {
    let mut builder = Gateway::builder(build_registry(config), authenticator(config)).node(config.gateway.node);
    if config.audit.enabled {
        tracing::info!(directory = %config.audit.directory.display(), "audit enabled");
        builder = builder.audit(AuditHooks::new(
            Arc::new(InMemoryAuditStore::new()),
            Arc::new(FileObjectStore::new(&config.audit.directory)),
        ));
    }
    builder.build()
}

fn build_registry(config: &Config) -> ProviderRegistry {
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

fn authenticator(config: &Config) -> Arc<dyn Authenticator> {
    match config.principal {
        Some(principal) => Arc::new(StaticAuthenticator::new(Principal {
            organization_id: principal.organization_id,
            project_id: principal.project_id,
        })),
        None => {
            tracing::warn!("no [principal] configured, every request will be rejected");
            Arc::new(StaticAuthenticator::deny_all())
        }
    }
}

pub fn client_source(config: &Config) -> ClientSource {
    ClientSource {
        source: config.gateway.source.clone(),
        environment: config.gateway.environment.clone(),
        region: config.gateway.region.clone(),
    }
}

/// Credential configured for `tag`
pub fn credential(config: &Config, tag: &str) -> anyhow::Result<Credential> {
    let Some(configured) = config.credentials.get(tag) else {
        anyhow::bail!("no [credentials.{tag}] section in the configuration");
    };
    let value: Map<String, Value> = configured
        .value
        .iter()
        .map(|(key, secret)| (key.clone(), Value::String(secret.expose_secret().to_owned())))
        .collect();
    Ok(Credential::new(configured.id, Value::Object(value)))
}
