use http::StatusCode;
use switchboard_core::HttpError;
use switchboard_llm::LlmError;
use thiserror::Error;

/// Shown to callers without a principal or project
pub const UNAUTHENTICATED_MESSAGE: &str = "Please provide valid service credentials to perform invoke.";

/// Shown to callers when a streamed request fails outside the vendor stream
pub const INTERNAL_MESSAGE: &str = "Internal server error processing your request";

/// Errors surfaced by the gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Caller has no principal, or the principal has no project
    #[error("unauthenticated request")]
    Unauthenticated,

    /// Adapter failed, or lacks the requested capability
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// Unexpected internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl HttpError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            // adapter failures always answer 400, the vendor status stays in the message
            Self::Llm(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::Unauthenticated => "authentication_error",
            Self::Llm(e) => e.error_type(),
            Self::Internal(_) => "internal_error",
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Unauthenticated => UNAUTHENTICATED_MESSAGE.to_owned(),
            Self::Llm(e) => e.client_message(),
            Self::Internal(_) => INTERNAL_MESSAGE.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_errors_answer_bad_request() {
        let err = GatewayError::from(LlmError::status(StatusCode::SERVICE_UNAVAILABLE, "overloaded"));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_type(), "upstream_error");
        assert!(err.client_message().contains("overloaded"));
    }

    #[test]
    fn unauthenticated_carries_the_fixed_message() {
        let err = GatewayError::Unauthenticated;
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.client_message(), UNAUTHENTICATED_MESSAGE);
    }
}
