//! Error types for the API client.
//!
//! # Design
//! Every failure a verb operation can hit is normalised into one `ApiError`
//! variant before it reaches the caller, so callers can `match` on a closed set
//! instead of inspecting transport or codec errors. Variants carry the response
//! when one was received, which is enough to diagnose a failure without going
//! back to the transport.
//!
//! The classification is by pipeline stage, not by HTTP semantics: a 404 and a
//! 503 are both `ServerError`.

use std::error::Error as StdError;
use std::path::PathBuf;

use thiserror::Error;

use crate::codec::CodecError;
use crate::http::HttpResponse;

/// Substituted when a failed response carries no `x-request-id` header.
pub const UNKNOWN_REQUEST_ID: &str = "N/A";

/// Errors returned by `ApiClient` verb operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The endpoint requires authentication but returned no auth headers.
    #[error("missing auth header")]
    MissingAuthHeader,

    /// The request body could not be serialised.
    #[error("request encoding failed")]
    EncodingFailed(#[source] EncodingError),

    /// DNS, connection, timeout or cancellation failure below HTTP.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The transport produced something that is not a valid HTTP response.
    #[error("invalid response")]
    InvalidResponse(HttpResponse),

    /// The server answered with a status outside `200..=299`.
    #[error("server error {status_code} (request id {request_id})")]
    ServerError {
        response: HttpResponse,
        status_code: u16,
        request_id: String,
    },

    /// The response body could not be decoded into the expected type.
    ///
    /// `message` holds the full text of the codec failure.
    #[error("response decoding failed")]
    DecodingFailed {
        response: HttpResponse,
        message: String,
        #[source]
        source: Option<CodecError>,
    },

    #[error("unknown error")]
    Unknown,
}

/// Cause attached to `ApiError::EncodingFailed`.
#[derive(Debug, Error)]
pub enum EncodingError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("cannot read {}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ApiError {
    /// True when the failure was caused by how the request was put together
    /// rather than by the network or the server. Client errors are not worth
    /// retrying.
    pub fn is_client_error(&self) -> bool {
        match self {
            ApiError::MissingAuthHeader
            | ApiError::EncodingFailed(_)
            | ApiError::DecodingFailed { .. } => true,
            ApiError::NetworkError(_)
            | ApiError::InvalidResponse(_)
            | ApiError::ServerError { .. }
            | ApiError::Unknown => false,
        }
    }

    /// HTTP status of the response this error carries, if any.
    pub fn status_code(&self) -> Option<u16> {
        self.response().map(|response| response.status)
    }

    /// Correlation id of a `ServerError`.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            ApiError::ServerError { request_id, .. } => Some(request_id),
            _ => None,
        }
    }

    /// Display text of this error and every cause below it.
    pub fn describe(&self) -> String {
        error_chain(self)
    }

    /// Response received before the failure, if the call got that far.
    pub fn response(&self) -> Option<&HttpResponse> {
        match self {
            ApiError::InvalidResponse(response)
            | ApiError::ServerError { response, .. }
            | ApiError::DecodingFailed { response, .. } => Some(response),
            _ => None,
        }
    }
}

/// `err` followed by each of its sources, joined with `": "`.
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

impl From<EncodingError> for ApiError {
    fn from(err: EncodingError) -> Self {
        ApiError::EncodingFailed(err)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    fn server_error(status: u16) -> ApiError {
        ApiError::ServerError {
            response: HttpResponse::new(status),
            status_code: status,
            request_id: "req-123".to_string(),
        }
    }

    #[test]
    fn client_error_classification() {
        let decoding = ApiError::DecodingFailed {
            response: HttpResponse::new(200),
            message: "bad".to_string(),
            source: None,
        };
        let encoding = ApiError::EncodingFailed(EncodingError::File {
            path: PathBuf::from("/missing"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        });

        assert!(ApiError::MissingAuthHeader.is_client_error());
        assert!(encoding.is_client_error());
        assert!(decoding.is_client_error());

        assert!(!ApiError::NetworkError("timeout".to_string()).is_client_error());
        assert!(!ApiError::InvalidResponse(HttpResponse::new(0)).is_client_error());
        assert!(!server_error(404).is_client_error());
        assert!(!server_error(500).is_client_error());
        assert!(!ApiError::Unknown.is_client_error());
    }

    #[test]
    fn server_error_display_includes_status_and_request_id() {
        assert_eq!(
            server_error(404).to_string(),
            "server error 404 (request id req-123)"
        );
    }

    #[test]
    fn accessors_expose_response_context() {
        let err = server_error(503);
        assert_eq!(err.status_code(), Some(503));
        assert_eq!(err.request_id(), Some("req-123"));
        assert!(ApiError::MissingAuthHeader.status_code().is_none());
        assert!(ApiError::MissingAuthHeader.request_id().is_none());
    }

    #[test]
    fn encoding_failure_keeps_file_cause() {
        let err: ApiError = EncodingError::File {
            path: PathBuf::from("/tmp/nope.txt"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        }
        .into();
        let cause = err.source().unwrap().to_string();
        assert!(cause.contains("/tmp/nope.txt"));
    }

    #[test]
    fn each_level_names_its_cause_once() {
        let err: ApiError = EncodingError::File {
            path: PathBuf::from("/tmp/nope.txt"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        }
        .into();
        assert_eq!(err.to_string(), "request encoding failed");
        assert_eq!(
            err.describe(),
            "request encoding failed: cannot read /tmp/nope.txt: no such file"
        );
        assert_eq!(err.describe().matches("no such file").count(), 1);
    }

    #[test]
    fn describe_without_causes_is_display() {
        assert_eq!(server_error(500).describe(), server_error(500).to_string());
        assert_eq!(ApiError::MissingAuthHeader.describe(), "missing auth header");
    }
}
