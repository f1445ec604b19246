use std::path::PathBuf;

use kube::core::admission::{ConvertAdmissionReviewError, SerializePatchError};
use thiserror::Error;

/// Errors that can occur while starting or running the webhook server
#[derive(Error, Debug)]
pub enum Error {
    /// A file required at startup (TLS certificate or key) is missing
    #[error("Expected file to exist, but doesn't: '{}'", .0.display())]
    MissingFile(PathBuf),

    /// Error while inspecting the filesystem
    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),

    /// The configured log level could not be parsed
    #[error("invalid log level: {0}")]
    LogLevel(#[from] tracing_subscriber::filter::ParseError),

    /// The TLS server could not be configured or bound
    #[error("failed to start TLS server: {0}")]
    Serve(#[source] warp::Error),
}

/// Errors rejecting an inbound request before it reaches a handler
///
/// These are surfaced to the caller as HTTP 400.
#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("Content-Type: '{0}', expected: application/json")]
    ContentType(String),

    #[error("empty admission request body")]
    EmptyBody,

    #[error("request could not be decoded: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("unsupported group version kind: {api_version}, Kind={kind}")]
    UnsupportedKind { api_version: String, kind: String },

    #[error("invalid admission review: {0}")]
    Invalid(#[from] ConvertAdmissionReviewError),
}

/// Errors that can occur during admission handler execution
///
/// These never become HTTP errors, they are reported inside the admission response.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The request targets something other than core/v1 pods
    #[error("expected resource to be: '/v1, Resource=pods', actual: '{actual}'")]
    UnexpectedResource { actual: String },

    /// The request carries no object to mutate
    #[error("failed to get pod: request has no object")]
    MissingObject,

    /// The request object is not a valid Pod
    #[error("failed to get pod: {0}")]
    Decode(#[source] serde_json::Error),

    /// Error during JSON serialization of a patch value
    #[error("SerializationError: {0}")]
    SerializationError(#[source] serde_json::Error),

    /// The patch list could not be attached to the response
    #[error("failed to marshal patches: {0}")]
    Patch(#[from] SerializePatchError),
}

/// Result type for webhook operations
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_names_the_path() {
        let err = Error::MissingFile(PathBuf::from("/etc/admission-webhook/tls/tls.crt"));
        assert_eq!(
            err.to_string(),
            "Expected file to exist, but doesn't: '/etc/admission-webhook/tls/tls.crt'"
        );
    }

    #[test]
    fn unexpected_resource_reports_actual() {
        let err = HandlerError::UnexpectedResource {
            actual: "apps/v1, Resource=deployments".to_string(),
        };
        assert!(err.to_string().contains("apps/v1, Resource=deployments"));
    }

    #[test]
    fn content_type_error_names_expected_type() {
        let err = ReviewError::ContentType("text/plain".to_string());
        assert_eq!(
            err.to_string(),
            "Content-Type: 'text/plain', expected: application/json"
        );
    }

    #[test]
    fn decode_errors_carry_source() {
        let err = HandlerError::Decode(serde_json::from_str::<()>("invalid").unwrap_err());
        assert!(err.to_string().starts_with("failed to get pod:"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
