//! Audit record store

use async_trait::async_trait;
use dashmap::DashMap;
use indexmap::IndexMap;

use crate::error::AuditError;
use crate::record::{AuditFilter, AuditRecord, NewAuditRecord, Pagination};

/// Relational store of audit records
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Create the record, or re-stamp its status and metrics if it exists
    async fn create(&self, record: NewAuditRecord) -> Result<AuditRecord, AuditError>;

    /// Merge routing metadata into an existing record
    async fn update_metadata(
        &self,
        request_id: u64,
        extras: &IndexMap<String, String>,
    ) -> Result<AuditRecord, AuditError>;

    /// One record within an organization and project
    async fn get(&self, organization_id: u64, project_id: u64, id: u64) -> Result<AuditRecord, AuditError>;

    /// Total matching count and one page of matching records, newest first
    async fn get_all(
        &self,
        organization_id: u64,
        project_id: u64,
        pagination: Pagination,
        filter: &AuditFilter,
    ) -> Result<(u64, Vec<AuditRecord>), AuditError>;
}

/// Audit store held in process memory
#[derive(Debug, Default)]
pub struct InMemoryAuditStore {
    records: DashMap<u64, AuditRecord>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn create(&self, record: NewAuditRecord) -> Result<AuditRecord, AuditError> {
        let mut entry = self.records.entry(record.id).or_insert_with(|| AuditRecord {
            id: record.id,
            organization_id: record.organization_id,
            project_id: record.project_id,
            credential_id: record.credential_id,
            provider: record.provider.clone(),
            key_prefix: record.key_prefix.clone(),
            metrics: Vec::new(),
            status: record.status,
            metadata: IndexMap::new(),
        });
        entry.metrics = record.metrics;
        entry.status = record.status;
        Ok(entry.clone())
    }

    async fn update_metadata(
        &self,
        request_id: u64,
        extras: &IndexMap<String, String>,
    ) -> Result<AuditRecord, AuditError> {
        let mut entry = self
            .records
            .get_mut(&request_id)
            .ok_or(AuditError::RecordNotFound(request_id))?;
        entry
            .metadata
            .extend(extras.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(entry.clone())
    }

    async fn get(&self, organization_id: u64, project_id: u64, id: u64) -> Result<AuditRecord, AuditError> {
        self.records
            .get(&id)
            .filter(|r| r.organization_id == organization_id && r.project_id == project_id)
            .map(|r| r.clone())
            .ok_or(AuditError::RecordNotFound(id))
    }

    async fn get_all(
        &self,
        organization_id: u64,
        project_id: u64,
        pagination: Pagination,
        filter: &AuditFilter,
    ) -> Result<(u64, Vec<AuditRecord>), AuditError> {
        let mut matching: Vec<AuditRecord> = self
            .records
            .iter()
            .filter(|r| r.organization_id == organization_id && r.project_id == project_id && filter.matches(r))
            .map(|r| r.clone())
            .collect();
        matching.sort_by(|a, b| b.id.cmp(&a.id));

        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(pagination.offset())
            .take(pagination.page_size as usize)
            .collect();
        Ok((total, page))
    }
}
