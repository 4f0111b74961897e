use thiserror::Error;

/// Audit persistence errors
///
/// Never shown to the caller of the gateway; the hook tasks log them.
#[derive(Debug, Error)]
pub enum AuditError {
    /// No audit record with this id
    #[error("audit record {0} not found")]
    RecordNotFound(u64),

    /// No stored object under this key
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    /// Key would escape the object store root
    #[error("invalid object key: {0}")]
    InvalidKey(String),

    /// Object store I/O failure
    #[error("object store error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
