//! Caller authentication

use std::collections::HashMap;
use std::fmt::Write as _;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use switchboard_core::RequestContext;

/// Authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub organization_id: u64,
    /// Project the caller acts in; calls need one
    #[serde(default)]
    pub project_id: Option<u64>,
}

impl Principal {
    pub const fn new(organization_id: u64, project_id: u64) -> Self {
        Self {
            organization_id,
            project_id: Some(project_id),
        }
    }

    pub const fn has_project(&self) -> bool {
        self.project_id.is_some()
    }

    pub const fn current_organization_id(&self) -> u64 {
        self.organization_id
    }

    /// Project id, `0` when there is none
    pub fn current_project_id(&self) -> u64 {
        self.project_id.unwrap_or_default()
    }
}

/// Resolves the caller of a request
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// The caller's principal, or `None` when the request is anonymous
    async fn authorize(&self, context: &RequestContext) -> Option<Principal>;
}

/// Authenticator answering every request with the same principal
#[derive(Debug, Clone, Default)]
pub struct StaticAuthenticator {
    principal: Option<Principal>,
}

impl StaticAuthenticator {
    pub const fn new(principal: Principal) -> Self {
        Self {
            principal: Some(principal),
        }
    }

    /// Authenticator that rejects everyone
    pub const fn deny_all() -> Self {
        Self { principal: None }
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn authorize(&self, _context: &RequestContext) -> Option<Principal> {
        self.principal
    }
}

/// Authenticator keyed by bearer API keys
///
/// Keys are held as SHA-256 digests and looked up from the
/// `authorization: Bearer <key>` request metadata.
#[derive(Debug, Clone, Default)]
pub struct ApiKeyAuthenticator {
    keys: HashMap<String, Principal>,
}

impl ApiKeyAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_key(mut self, key: &str, principal: Principal) -> Self {
        self.keys.insert(sha256_hex(key), principal);
        self
    }
}

#[async_trait]
impl Authenticator for ApiKeyAuthenticator {
    async fn authorize(&self, context: &RequestContext) -> Option<Principal> {
        let token = context
            .metadata
            .get("authorization")
            .and_then(|v| v.strip_prefix("Bearer "))?;
        let principal = self.keys.get(&sha256_hex(token)).copied();
        if principal.is_none() {
            tracing::warn!("API key authentication failed");
        }
        principal
    }
}

fn sha256_hex(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest.iter().fold(String::with_capacity(64), |mut hex, byte| {
        let _ = write!(hex, "{byte:02x}");
        hex
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bearer_key_resolves_its_principal() {
        let auth = ApiKeyAuthenticator::new().with_key("sk-test", Principal::new(1, 2));
        let context = RequestContext::empty().with_metadata("Authorization", "Bearer sk-test");

        assert_eq!(auth.authorize(&context).await, Some(Principal::new(1, 2)));
    }

    #[tokio::test]
    async fn unknown_or_missing_key_is_anonymous() {
        let auth = ApiKeyAuthenticator::new().with_key("sk-test", Principal::new(1, 2));

        let wrong = RequestContext::empty().with_metadata("authorization", "Bearer sk-other");
        assert_eq!(auth.authorize(&wrong).await, None);
        assert_eq!(auth.authorize(&RequestContext::empty()).await, None);
    }

    #[test]
    fn principal_without_project() {
        let principal = Principal {
            organization_id: 1,
            project_id: None,
        };
        assert!(!principal.has_project());
        assert_eq!(principal.current_project_id(), 0);
    }

    #[test]
    fn digest_is_lower_hex() {
        assert_eq!(sha256_hex("abc").len(), 64);
        assert!(sha256_hex("abc").starts_with("ba7816bf"));
    }
}
