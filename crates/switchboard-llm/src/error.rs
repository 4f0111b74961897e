use std::time::Duration;

use http::StatusCode;
use switchboard_core::{CredentialError, HttpError, Metric};
use thiserror::Error;

/// Errors that can occur while talking to a vendor
#[derive(Debug, Error)]
pub enum LlmError {
    /// Credential lacks a key the vendor needs
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// No adapter is registered under this provider tag
    #[error("provider not found: {provider}")]
    ProviderNotFound { provider: String },

    /// Vendor request failed or returned a non-success status
    #[error("upstream error: {message}")]
    Upstream {
        /// Vendor status code, when the vendor answered at all
        status: Option<StatusCode>,
        message: String,
    },

    /// Vendor stream broke mid-response
    #[error("streaming error: {0}")]
    Streaming(String),

    /// Request cannot be expressed for this vendor
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Adapter does not offer the requested capability
    #[error("{provider} does not support {operation}")]
    Unsupported {
        provider: String,
        operation: &'static str,
    },

    /// Vendor did not answer within the call timeout
    #[error("vendor call timed out after {0:?}")]
    Timeout(Duration),

    /// Client cancelled the request
    #[error("request cancelled")]
    Cancelled,

    /// Unexpected internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl LlmError {
    /// Upstream error for a transport failure (no vendor status)
    pub fn transport(error: impl std::fmt::Display) -> Self {
        Self::Upstream {
            status: None,
            message: error.to_string(),
        }
    }

    /// Upstream error for a non-success vendor response
    pub fn status(status: StatusCode, body: &str) -> Self {
        Self::Upstream {
            status: Some(status),
            message: format!("provider returned {status}: {body}"),
        }
    }
}

impl HttpError for LlmError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Credential(_) | Self::InvalidRequest(_) | Self::Unsupported { .. } | Self::Cancelled => {
                StatusCode::BAD_REQUEST
            }
            Self::ProviderNotFound { .. } => StatusCode::NOT_FOUND,
            Self::Upstream { status, .. } => match status {
                Some(s) if s.is_client_error() => *s,
                _ => StatusCode::BAD_GATEWAY,
            },
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Streaming(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::Credential(_) => "credential_error",
            Self::ProviderNotFound { .. } => "not_found_error",
            Self::Upstream { .. } => "upstream_error",
            Self::Streaming(_) => "streaming_error",
            Self::InvalidRequest(_) => "invalid_request_error",
            Self::Unsupported { .. } => "unsupported_error",
            Self::Timeout(_) => "timeout_error",
            Self::Cancelled => "cancelled_error",
            Self::Internal(_) => "internal_error",
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Internal(_) => "an internal error occurred".to_owned(),
            other => other.to_string(),
        }
    }
}

/// A failed vendor call, with the metrics gathered up to the failure
#[derive(Debug, Error)]
#[error("{error}")]
pub struct CallError {
    #[source]
    pub error: LlmError,
    /// Metrics with `STATUS=FAILED` and the elapsed time
    pub metrics: Vec<Metric>,
}

/// Result of a unary vendor call
pub type CallResult<T> = Result<crate::Completion<T>, CallError>;
