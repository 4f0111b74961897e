//! Audit record model

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use switchboard_core::Metric;

/// Lifecycle of an audit record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditStatus {
    /// The vendor call is in flight
    Active,
    /// The call ended; its metrics say whether it succeeded
    Complete,
}

/// Fields written when a record is created or re-stamped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditRecord {
    /// Request id, also the record id
    pub id: u64,
    pub organization_id: u64,
    pub project_id: u64,
    pub credential_id: u64,
    /// Provider tag of the adapter that served the call
    pub provider: String,
    /// `{org}/{project}/{credential}` prefix of the stored bodies
    pub key_prefix: String,
    pub metrics: Vec<Metric>,
    pub status: AuditStatus,
}

/// One audited vendor call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: u64,
    pub organization_id: u64,
    pub project_id: u64,
    pub credential_id: u64,
    pub provider: String,
    pub key_prefix: String,
    pub metrics: Vec<Metric>,
    pub status: AuditStatus,
    /// Routing metadata stamped by the gateway
    #[serde(default)]
    pub metadata: IndexMap<String, String>,
}

impl AuditRecord {
    /// Object key of the stored vendor request body
    pub fn request_key(&self) -> String {
        object_key(&self.key_prefix, self.id, REQUEST_OBJECT)
    }

    /// Object key of the stored vendor response body
    pub fn response_key(&self) -> String {
        object_key(&self.key_prefix, self.id, RESPONSE_OBJECT)
    }
}

/// Page selection for [`crate::AuditStore::get_all`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// 1-based page number
    pub page: u32,
    pub page_size: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 1, page_size: 20 }
    }
}

impl Pagination {
    /// Number of records before this page
    pub const fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize) * self.page_size as usize
    }
}

/// Optional record filters; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditFilter {
    pub provider: Option<String>,
    pub credential_id: Option<u64>,
    pub status: Option<AuditStatus>,
}

impl AuditFilter {
    pub fn matches(&self, record: &AuditRecord) -> bool {
        self.provider.as_ref().is_none_or(|p| *p == record.provider)
            && self.credential_id.is_none_or(|c| c == record.credential_id)
            && self.status.is_none_or(|s| s == record.status)
    }
}

pub(crate) const REQUEST_OBJECT: &str = "request.json";
pub(crate) const RESPONSE_OBJECT: &str = "response.json";

/// `{org}/{project}/{credential}`
pub fn object_prefix(organization_id: u64, project_id: u64, credential_id: u64) -> String {
    format!("{organization_id}/{project_id}/{credential_id}")
}

/// `{prefix}/{request_id}__{name}`
pub fn object_key(prefix: &str, request_id: u64, name: &str) -> String {
    format!("{prefix}/{request_id}__{name}")
}
