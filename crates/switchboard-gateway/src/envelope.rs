//! Response envelopes returned to the transport

use serde::{Deserialize, Serialize};
use switchboard_core::{HttpError, Metric};
use switchboard_llm::LlmError;

use crate::error::{GatewayError, INTERNAL_MESSAGE};

/// Error details of a failed envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error_code: u64,
    /// Full error text, vendor message included
    pub error_message: String,
    /// Message meant for end users
    pub human_message: String,
}

/// Uniform response shape for every gateway operation
///
/// Streaming responses are sequences of envelopes: one per token, then one
/// carrying the complete message and the metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub code: u16,
    pub success: bool,
    pub request_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metrics: Vec<Metric>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl<T> Envelope<T> {
    pub const fn success(request_id: u64, data: T, metrics: Vec<Metric>) -> Self {
        Self {
            code: 200,
            success: true,
            request_id,
            data: Some(data),
            metrics,
            error: None,
        }
    }

    /// Failure built from `error`, keeping whatever metrics the call gathered
    pub fn failure(request_id: u64, error: &GatewayError, metrics: Vec<Metric>) -> Self {
        Self::error(
            request_id,
            error.status_code().as_u16(),
            error.to_string(),
            error.client_message(),
            metrics,
        )
    }

    /// Failure reported by a vendor stream while it was being read
    pub fn vendor_failure(request_id: u64, error: &LlmError) -> Self {
        Self::error(request_id, 400, error.to_string(), error.client_message(), Vec::new())
    }

    /// Failure of a streamed request outside the vendor stream itself
    pub fn internal(request_id: u64, error: &GatewayError) -> Self {
        Self::error(request_id, 500, error.to_string(), INTERNAL_MESSAGE.to_owned(), Vec::new())
    }

    fn error(request_id: u64, code: u16, error_message: String, human_message: String, metrics: Vec<Metric>) -> Self {
        Self {
            code,
            success: false,
            request_id,
            data: None,
            metrics,
            error: Some(ErrorBody {
                error_code: u64::from(code),
                error_message,
                human_message,
            }),
        }
    }

    pub const fn is_success(&self) -> bool {
        self.success
    }
}
