//! The endpoint capability supplied by applications.

use std::collections::HashMap;

/// Describes one API resource the client can call.
///
/// Implemented by application types, typically one enum per API with a variant
/// per operation. The client never mutates an endpoint.
///
/// `auth_headers` distinguishes two cases that must not be conflated:
/// `Some(empty map)` means the call needs no authentication, while `None`
/// means the call requires authentication but no credentials are available.
/// The client refuses to send a request for `None`.
pub trait Endpoint: Send + Sync {
    /// Absolute URL of the resource.
    fn url(&self) -> String;

    /// Stable name used in logs, analytics records and mock matching.
    fn identity(&self) -> String;

    /// Headers carrying credentials for this call.
    fn auth_headers(&self) -> Option<HashMap<String, String>>;
}

impl<E: Endpoint + ?Sized> Endpoint for &E {
    fn url(&self) -> String {
        (**self).url()
    }

    fn identity(&self) -> String {
        (**self).identity()
    }

    fn auth_headers(&self) -> Option<HashMap<String, String>> {
        (**self).auth_headers()
    }
}
