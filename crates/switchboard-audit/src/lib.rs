//! Audit trail for gateway vendor calls
//!
//! Every audited call leaves one [`AuditRecord`] and two stored bodies,
//! `request.json` and `response.json`, under
//! `{org}/{project}/{credential}/{request_id}__`. Writes happen on
//! background tasks and never fail the call they describe.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod error;
pub mod hooks;
pub mod object;
pub mod record;
pub mod store;

pub use error::AuditError;
pub use hooks::{AuditHooks, AuditTarget, RequestAndResponse, RequestScope};
pub use object::{FileObjectStore, InMemoryObjectStore, ObjectStore};
pub use record::{AuditFilter, AuditRecord, AuditStatus, NewAuditRecord, Pagination, object_key, object_prefix};
pub use store::{AuditStore, InMemoryAuditStore};
