//! Turns an endpoint into a transport-ready request.
//!
//! # Design
//! `build_request` only reads the endpoint and performs no I/O. Absent auth
//! headers are a hard failure, while an empty map means "no auth needed".
//! Default JSON headers are applied first and auth headers are laid over
//! them, so an endpoint can override `Content-Type` or `Accept` if it must.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::codec::Codec;
use crate::endpoint::Endpoint;
use crate::error::{ApiError, EncodingError};
use crate::hooks::{log_body, Logger};
use crate::http::{HttpMethod, HttpRequest};

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Build the request skeleton for `endpoint`: method, URL and headers.
pub fn build_request(endpoint: &dyn Endpoint, method: HttpMethod) -> Result<HttpRequest, ApiError> {
    let auth_headers = endpoint.auth_headers().ok_or(ApiError::MissingAuthHeader)?;

    let mut request = HttpRequest::new(method, endpoint.url());
    request.set_header("Content-Type", JSON_CONTENT_TYPE);
    request.set_header("Accept", JSON_CONTENT_TYPE);
    for (name, value) in auth_headers.into_iter().collect::<BTreeMap<_, _>>() {
        request.set_header(name, value);
    }
    Ok(request)
}

/// Encode `body` with `codec` and attach it. `None` leaves the request as is.
///
/// When `logger` is given the encoded body is logged at debug level.
pub fn attach_json_body<C, T>(
    request: &mut HttpRequest,
    body: Option<&T>,
    codec: &C,
    logger: Option<&dyn Logger>,
) -> Result<(), ApiError>
where
    C: Codec,
    T: Serialize + ?Sized,
{
    let Some(body) = body else {
        return Ok(());
    };
    let bytes = codec.encode(body).map_err(EncodingError::from)?;
    log_body(logger, "request body", &bytes);
    request.body = Some(bytes);
    Ok(())
}
