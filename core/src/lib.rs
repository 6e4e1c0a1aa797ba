//! Typed HTTP client for application-defined API endpoints.
//!
//! # Overview
//! Applications describe each API operation as an `Endpoint` (URL, identity,
//! auth headers). `ApiClient` turns an endpoint plus an optional typed body
//! into an HTTP request, sends it through a `Transport`, validates the status
//! and decodes the body into the caller's type. Failures of any stage surface
//! as one `ApiError`.
//!
//! # Design
//! - The request pipeline is split into plain functions (`build_request`,
//!   `attach_json_body`, `attach_multipart`, `validate`, `decode`) that work on
//!   plain-data `HttpRequest` / `HttpResponse` values and do no network I/O.
//! - The network round-trip sits behind the `Transport` trait. `ReqwestTransport`
//!   is the default; `MockTransport` serves tests.
//! - Logging, analytics and the 401 handler are optional collaborators fixed
//!   at construction. The client has no mutable state of its own.
//! - Every verb is available as an `async fn` and as a `*_with_callback`
//!   method that spawns the call on tokio.

pub mod client;
pub mod codec;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod hooks;
pub mod http;
pub mod mock;
pub mod multipart;
pub mod request;
pub mod response;
pub mod transport;

pub use client::{ApiClient, ApiClientBuilder};
pub use codec::{Codec, CodecError, JsonCodec};
pub use config::{ClientConfig, TransportConfig};
pub use endpoint::Endpoint;
pub use error::{ApiError, EncodingError};
pub use hooks::{AnalyticsRecord, AnalyticsSink, Logger, TracingLogger, UnauthorizedHandler};
pub use http::{CachePolicy, HttpMethod, HttpRequest, HttpResponse};
pub use mock::{MockFailure, MockTransport};
pub use multipart::MultipartPayload;
pub use response::NoContent;
#[cfg(feature = "reqwest")]
pub use transport::ReqwestTransport;
pub use transport::{Transport, TransportError};
