//! Background audit hooks
//!
//! Each audited request gets a pair of [`Hooks`] from [`AuditHooks::hooks_for`].
//! The pre hook spawns a task that creates the `ACTIVE` record, stores the
//! routing metadata and writes `request.json`. The post hook spawns a task
//! that waits until the request is finished (its [`RequestScope`] is
//! dropped) and the pre task has finished writing, then re-stamps the
//! record `COMPLETE` with the final metrics and writes `response.json`.
//!
//! The tasks never see the client's cancellation token, so a cancelled
//! request is still persisted. They run on a [`TaskTracker`] that
//! [`AuditHooks::shutdown`] drains. Failures are logged and dropped.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use switchboard_core::{Hooks, Metric};
use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, DropGuard};
use tokio_util::task::TaskTracker;

use crate::object::ObjectStore;
use crate::record::{AuditRecord, AuditStatus, NewAuditRecord, REQUEST_OBJECT, RESPONSE_OBJECT, object_key, object_prefix};
use crate::store::AuditStore;

/// Who made an audited call and through which credential
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditTarget {
    pub request_id: u64,
    pub organization_id: u64,
    pub project_id: u64,
    pub credential_id: u64,
    /// Provider tag of the adapter serving the call
    pub provider: String,
    /// Routing metadata stamped by the gateway
    pub extras: IndexMap<String, String>,
}

/// Lifetime of one audited request
///
/// Dropping it marks the request finished and releases the post task.
#[derive(Debug)]
pub struct RequestScope {
    _done: DropGuard,
}

impl RequestScope {
    /// Mark the request finished now
    pub fn finish(self) {
        drop(self);
    }
}

/// Stored bodies of one audited call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestAndResponse {
    pub request: Option<Vec<u8>>,
    pub response: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PreState {
    Idle,
    Running,
    Done,
}

/// Factory for per-request audit hooks
#[derive(Clone)]
pub struct AuditHooks {
    records: Arc<dyn AuditStore>,
    objects: Arc<dyn ObjectStore>,
    tracker: TaskTracker,
}

impl std::fmt::Debug for AuditHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditHooks")
            .field("pending", &self.tracker.len())
            .finish_non_exhaustive()
    }
}

impl AuditHooks {
    pub fn new(records: Arc<dyn AuditStore>, objects: Arc<dyn ObjectStore>) -> Self {
        Self {
            records,
            objects,
            tracker: TaskTracker::new(),
        }
    }

    pub fn records(&self) -> &Arc<dyn AuditStore> {
        &self.records
    }

    pub fn objects(&self) -> &Arc<dyn ObjectStore> {
        &self.objects
    }

    /// Hooks bound to one request, and the scope that marks it finished
    pub fn hooks_for(&self, target: AuditTarget) -> (Hooks, RequestScope) {
        let done = CancellationToken::new();
        let (pre_state, _) = watch::channel(PreState::Idle);
        let job = Arc::new(Job {
            key_prefix: object_prefix(target.organization_id, target.project_id, target.credential_id),
            target,
            records: Arc::clone(&self.records),
            objects: Arc::clone(&self.objects),
            pre_state,
        });

        let pre = {
            let job = Arc::clone(&job);
            let tracker = self.tracker.clone();
            Arc::new(move |body: Value| {
                job.pre_state.send_replace(PreState::Running);
                let job = Arc::clone(&job);
                tracker.spawn(async move {
                    job.record_request(&body).await;
                    job.pre_state.send_replace(PreState::Done);
                });
            })
        };

        let post = {
            let tracker = self.tracker.clone();
            let done = done.clone();
            Arc::new(move |body: Value, metrics: Vec<Metric>| {
                let job = Arc::clone(&job);
                let done = done.clone();
                let mut pre_state = job.pre_state.subscribe();
                tracker.spawn(async move {
                    done.cancelled().await;
                    // The sender lives in `job`, so this only fails if the
                    // pre task never settles.
                    let _ = pre_state.wait_for(|s| *s != PreState::Running).await;
                    job.record_response(&body, metrics).await;
                });
            })
        };

        let scope = RequestScope {
            _done: done.drop_guard(),
        };
        (Hooks::new(pre, post), scope)
    }

    /// Both stored bodies of a record, fetched concurrently
    ///
    /// A body that cannot be read is reported as `None`.
    pub async fn get_request_and_response(&self, record: &AuditRecord) -> RequestAndResponse {
        let request_key = record.request_key();
        let response_key = record.response_key();
        let (request, response) = tokio::join!(self.objects.get(&request_key), self.objects.get(&response_key));

        let read = |key: &str, result: Result<Vec<u8>, crate::AuditError>| match result {
            Ok(data) => Some(data),
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to read audit object");
                None
            }
        };
        RequestAndResponse {
            request: read(&request_key, request),
            response: read(&response_key, response),
        }
    }

    /// Stop accepting hook tasks and wait for the pending ones
    ///
    /// Post tasks wait for their requests to finish, so every
    /// [`RequestScope`] must be dropped first.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        tracing::debug!("audit hooks drained");
    }
}

/// Everything a hook task needs for one request
struct Job {
    target: AuditTarget,
    key_prefix: String,
    records: Arc<dyn AuditStore>,
    objects: Arc<dyn ObjectStore>,
    pre_state: watch::Sender<PreState>,
}

impl Job {
    fn record(&self, status: AuditStatus, metrics: Vec<Metric>) -> NewAuditRecord {
        NewAuditRecord {
            id: self.target.request_id,
            organization_id: self.target.organization_id,
            project_id: self.target.project_id,
            credential_id: self.target.credential_id,
            provider: self.target.provider.clone(),
            key_prefix: self.key_prefix.clone(),
            metrics,
            status,
        }
    }

    async fn record_request(&self, body: &Value) {
        let request_id = self.target.request_id;
        if let Err(e) = self.records.create(self.record(AuditStatus::Active, Vec::new())).await {
            tracing::warn!(request_id, error = %e, "failed to create audit record");
            return;
        }
        if let Err(e) = self.records.update_metadata(request_id, &self.target.extras).await {
            tracing::warn!(request_id, error = %e, "failed to store audit metadata");
        }
        self.store(REQUEST_OBJECT, body).await;
    }

    async fn record_response(&self, body: &Value, metrics: Vec<Metric>) {
        let request_id = self.target.request_id;
        if let Err(e) = self.records.update_metadata(request_id, &self.target.extras).await {
            tracing::warn!(request_id, error = %e, "failed to update audit metadata");
        }
        if let Err(e) = self.records.create(self.record(AuditStatus::Complete, metrics)).await {
            tracing::warn!(request_id, error = %e, "failed to complete audit record");
        }
        self.store(RESPONSE_OBJECT, body).await;
    }

    async fn store(&self, name: &str, body: &Value) {
        let key = object_key(&self.key_prefix, self.target.request_id, name);
        let data = serde_json::to_vec(body).unwrap_or_else(|e| {
            tracing::warn!(key = %key, error = %e, "failed to encode audit body");
            b"{}".to_vec()
        });
        if let Err(e) = self.objects.store(&key, data).await {
            tracing::warn!(key = %key, error = %e, "failed to store audit object");
        }
    }
}
