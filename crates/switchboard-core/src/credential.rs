//! Vendor credential resolution
//!
//! Credentials arrive as opaque structured values. Adapters resolve them once
//! at construction into a flat map and pull the keys they need lazily, so a
//! missing key fails the call before any network I/O.

use std::fmt;

use http::StatusCode;
use indexmap::IndexMap;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::HttpError;

/// Errors raised while resolving a credential
///
/// These are terminal: retrying with the same credential cannot succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// Credential value is not a key/value object
    #[error("credential {id} is malformed: expected an object")]
    Malformed { id: u64 },

    /// A key the vendor needs is absent or empty
    #[error("credential is missing required key `{key}`")]
    MissingKey { key: String },
}

impl HttpError for CredentialError {
    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    fn error_type(&self) -> &str {
        "credential_error"
    }

    fn client_message(&self) -> String {
        self.to_string()
    }
}

/// Opaque credential as stored by the vault
#[derive(Clone, Serialize, Deserialize)]
pub struct Credential {
    /// Vault identifier, used in audit object keys
    pub id: u64,
    /// Structured secret material
    #[serde(default)]
    pub value: Value,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

impl Credential {
    pub const fn new(id: u64, value: Value) -> Self {
        Self { id, value }
    }

    /// Flatten the credential into a string-keyed map
    ///
    /// Pure and side-effect free. A `null` value resolves to an empty map,
    /// anything other than an object is malformed.
    pub fn resolve(&self) -> Result<ResolvedCredential, CredentialError> {
        let values = match &self.value {
            Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            Value::Null => IndexMap::new(),
            _ => return Err(CredentialError::Malformed { id: self.id }),
        };

        Ok(ResolvedCredential { id: self.id, values })
    }
}

/// Flat key/value view of a credential
#[derive(Clone, Default)]
pub struct ResolvedCredential {
    id: u64,
    values: IndexMap<String, Value>,
}

impl fmt::Debug for ResolvedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedCredential")
            .field("id", &self.id)
            .field("keys", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ResolvedCredential {
    pub const fn id(&self) -> u64 {
        self.id
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Optional string value; numbers are stringified, blanks read as absent
    pub fn optional(&self, key: &str) -> Option<String> {
        match self.values.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Required string value
    pub fn require(&self, key: &str) -> Result<String, CredentialError> {
        self.optional(key)
            .ok_or_else(|| CredentialError::MissingKey { key: key.to_owned() })
    }

    /// Required secret value
    pub fn secret(&self, key: &str) -> Result<SecretString, CredentialError> {
        self.require(key).map(SecretString::from)
    }
}
