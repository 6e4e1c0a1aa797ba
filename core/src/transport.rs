//! Transports execute an `HttpRequest` and hand back an `HttpResponse`.
//!
//! # Design
//! The pipeline only depends on the `Transport` trait, so tests substitute a
//! `MockTransport` instead of subclassing or patching the client. A reqwest
//! backend is provided behind the default `reqwest` feature.

use async_trait::async_trait;
use thiserror::Error;

use crate::http::{HttpRequest, HttpResponse};

/// Failures below the HTTP layer.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out")]
    Timeout,

    #[error("request cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

/// Sends requests over the network.
///
/// Shared by every concurrent call on a client.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[cfg(feature = "reqwest")]
pub use reqwest_backend::ReqwestTransport;

#[cfg(feature = "reqwest")]
mod reqwest_backend {
    use async_trait::async_trait;

    use super::{Transport, TransportError};
    use crate::config::TransportConfig;
    use crate::http::{CachePolicy, HttpMethod, HttpRequest, HttpResponse};

    /// `Transport` backed by a shared `reqwest::Client`.
    #[derive(Debug, Clone)]
    pub struct ReqwestTransport {
        inner: reqwest::Client,
    }

    impl ReqwestTransport {
        pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
            let inner = reqwest::Client::builder()
                .timeout(config.timeout())
                .connect_timeout(config.connect_timeout())
                .user_agent(config.user_agent.as_str())
                .build()
                .map_err(TransportError::from)?;
            Ok(Self { inner })
        }

        /// Wrap an already configured client.
        pub fn from_reqwest(client: reqwest::Client) -> Self {
            Self { inner: client }
        }
    }

    #[async_trait]
    impl Transport for ReqwestTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            let method = match request.method {
                HttpMethod::Get => reqwest::Method::GET,
                HttpMethod::Post => reqwest::Method::POST,
                HttpMethod::Put => reqwest::Method::PUT,
                HttpMethod::Delete => reqwest::Method::DELETE,
            };
            tracing::trace!(method = %request.method, url = %request.url, "sending request");

            let mut builder = self.inner.request(method, &request.url);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if request.cache_policy == CachePolicy::ReloadIgnoringCache {
                builder = builder
                    .header("Cache-Control", "no-cache")
                    .header("Pragma", "no-cache");
            }
            if let Some(timeout) = request.timeout {
                builder = builder.timeout(timeout);
            }
            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let response = builder.send().await?;
            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|value| (name.as_str().to_string(), value.to_string()))
                })
                .collect();
            let body = response.bytes().await?.to_vec();

            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        }
    }

    impl From<reqwest::Error> for TransportError {
        fn from(err: reqwest::Error) -> Self {
            if err.is_timeout() {
                TransportError::Timeout
            } else if err.is_connect() {
                TransportError::Connect(err.to_string())
            } else {
                TransportError::Other(err.to_string())
            }
        }
    }
}
