//! Response validation and typed decoding.

use std::any::Any;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::codec::Codec;
use crate::endpoint::Endpoint;
use crate::error::{error_chain, ApiError, UNKNOWN_REQUEST_ID};
use crate::hooks::{log_body, Logger, UnauthorizedHandler};
use crate::http::HttpResponse;

/// Header carrying the server's correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Marker for responses without a meaningful payload.
///
/// Decoding an empty body into `NoContent` always succeeds without touching
/// the codec. A non-empty body is still handed to the codec, and any JSON
/// object is accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoContent {}

/// Check the status of `response`.
///
/// A 401 notifies `on_unauthorized` with `endpoint` before the error is
/// returned. Statuses outside 100..=599 are not HTTP and yield
/// `InvalidResponse`.
pub fn validate(
    response: HttpResponse,
    endpoint: &dyn Endpoint,
    on_unauthorized: Option<&dyn UnauthorizedHandler>,
) -> Result<HttpResponse, ApiError> {
    if !(100..=599).contains(&response.status) {
        return Err(ApiError::InvalidResponse(response));
    }
    if response.is_success() {
        return Ok(response);
    }

    if response.status == 401 {
        if let Some(handler) = on_unauthorized {
            handler.on_unauthorized(endpoint);
        }
    }

    let request_id = response
        .header(REQUEST_ID_HEADER)
        .unwrap_or(UNKNOWN_REQUEST_ID)
        .to_string();
    Err(ApiError::ServerError {
        status_code: response.status,
        request_id,
        response,
    })
}

/// Decode the body of a validated response into `T`.
///
/// When `logger` is given the raw body is logged at debug level first.
pub fn decode<T, C>(codec: &C, response: &HttpResponse, logger: Option<&dyn Logger>) -> Result<T, ApiError>
where
    T: DeserializeOwned + 'static,
    C: Codec,
{
    log_body(logger, "response body", &response.body);

    if response.body.is_empty() {
        if let Some(empty) = no_content_as::<T>() {
            return Ok(empty);
        }
    }

    codec.decode(&response.body).map_err(|err| ApiError::DecodingFailed {
        response: response.clone(),
        message: error_chain(&err),
        source: Some(err),
    })
}

/// `Some(NoContent)` typed as `T` when `T` is `NoContent`, `None` otherwise.
fn no_content_as<T: 'static>() -> Option<T> {
    let marker: Box<dyn Any> = Box::new(NoContent {});
    marker.downcast::<T>().ok().map(|boxed| *boxed)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde::Deserialize;

    use super::*;
    use crate::codec::JsonCodec;

    struct Resource;

    impl Endpoint for Resource {
        fn url(&self) -> String {
            "https://api.example.com/resource".to_string()
        }

        fn identity(&self) -> String {
            "resource".to_string()
        }

        fn auth_headers(&self) -> Option<HashMap<String, String>> {
            Some(HashMap::new())
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Widget {
        id: u32,
        label: Option<String>,
    }

    #[test]
    fn success_statuses_pass_through() {
        for status in [200, 201, 204, 299] {
            let response = validate(HttpResponse::new(status), &Resource, None).unwrap();
            assert_eq!(response.status, status);
        }
    }

    #[test]
    fn not_found_carries_request_id() {
        let response = HttpResponse::new(404).with_header("x-request-id", "req-123");
        let err = validate(response, &Resource, None).unwrap_err();
        match err {
            ApiError::ServerError {
                status_code,
                request_id,
                response,
            } => {
                assert_eq!(status_code, 404);
                assert_eq!(request_id, "req-123");
                assert_eq!(response.status, 404);
            }
            other => panic!("expected ServerError, got {other:?}"),
        }
    }

    #[test]
    fn missing_request_id_becomes_placeholder() {
        let err = validate(HttpResponse::new(500), &Resource, None).unwrap_err();
        assert_eq!(err.request_id(), Some("N/A"));
        assert_eq!(err.status_code(), Some(500));
    }

    #[test]
    fn unauthorized_invokes_handler_once() {
        let calls = AtomicUsize::new(0);
        let handler = |endpoint: &dyn Endpoint| {
            assert_eq!(endpoint.identity(), "resource");
            calls.fetch_add(1, Ordering::SeqCst);
        };
        let err = validate(HttpResponse::new(401), &Resource, Some(&handler)).unwrap_err();
        assert_eq!(err.status_code(), Some(401));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn forbidden_does_not_invoke_handler() {
        let calls = AtomicUsize::new(0);
        let handler = |_: &dyn Endpoint| {
            calls.fetch_add(1, Ordering::SeqCst);
        };
        validate(HttpResponse::new(403), &Resource, Some(&handler)).unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn out_of_range_status_is_invalid_response() {
        let err = validate(HttpResponse::new(0), &Resource, None).unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
        let err = validate(HttpResponse::new(1000), &Resource, None).unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[test]
    fn empty_body_decodes_into_no_content() {
        let value: NoContent = decode(&JsonCodec::new(), &HttpResponse::new(204), None).unwrap();
        assert_eq!(value, NoContent {});
    }

    #[test]
    fn object_body_decodes_into_no_content() {
        let response = HttpResponse::new(200).with_body(br#"{"ignored":true}"#.to_vec());
        let value: NoContent = decode(&JsonCodec::new(), &response, None).unwrap();
        assert_eq!(value, NoContent {});
    }

    #[test]
    fn empty_body_into_other_type_is_decoding_failure() {
        let err = decode::<Widget, _>(&JsonCodec::new(), &HttpResponse::new(200), None).unwrap_err();
        match err {
            ApiError::DecodingFailed {
                response, source, ..
            } => {
                assert_eq!(response.status, 200);
                assert!(source.is_some());
            }
            other => panic!("expected DecodingFailed, got {other:?}"),
        }
    }

    #[test]
    fn typed_body_decodes() {
        let response = HttpResponse::new(200).with_body(br#"{"id":7,"label":null}"#.to_vec());
        let widget: Widget = decode(&JsonCodec::new(), &response, None).unwrap();
        assert_eq!(widget, Widget { id: 7, label: None });
    }

    #[test]
    fn malformed_body_keeps_message() {
        let response = HttpResponse::new(200).with_body(b"{\"id\":".to_vec());
        let err = decode::<Widget, _>(&JsonCodec::new(), &response, None).unwrap_err();
        assert_eq!(err.to_string(), "response decoding failed");
        assert!(err.describe().starts_with("response decoding failed: decode failed: "));
        assert_eq!(err.describe().matches("decode failed").count(), 1);
        match &err {
            ApiError::DecodingFailed { message, .. } => {
                assert!(message.starts_with("decode failed: EOF"));
            }
            other => panic!("expected DecodingFailed, got {other:?}"),
        }
        assert!(err.is_client_error());
    }
}
