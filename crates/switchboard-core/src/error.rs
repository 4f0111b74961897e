use http::StatusCode;

/// Trait for domain errors that can be turned into response envelopes
///
/// Implemented by each feature crate's error type. The gateway converts
/// these into `success: false` envelopes, keeping domain errors decoupled
/// from the transport.
pub trait HttpError: std::error::Error {
    /// Status code for this error
    fn status_code(&self) -> StatusCode;

    /// Machine-readable error type (e.g. `invalid_request_error`)
    fn error_type(&self) -> &str;

    /// Message safe to expose to API consumers
    fn client_message(&self) -> String;
}
