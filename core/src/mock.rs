//! In-memory transport for tests.
//!
//! Routes are keyed by method and URL. Every request that reaches the
//! transport is recorded, including requests with no matching route, which
//! receive a 404.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::transport::{Transport, TransportError};

#[derive(Debug, Clone)]
enum Reply {
    Respond(HttpResponse),
    Fail(MockFailure),
}

/// Transport-level failure a route can simulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    Timeout,
    Cancelled,
    ConnectionRefused,
}

#[derive(Debug, Default)]
struct Inner {
    routes: HashMap<(HttpMethod, String), Reply>,
    requests: Vec<HttpRequest>,
}

/// `Transport` that answers from a route table instead of the network.
///
/// Clones share the same routes and request log.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<Inner>>,
    latency: Option<Duration>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every reply, simulating network latency.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Answer `method url` with `response`.
    pub fn respond(&self, method: HttpMethod, url: impl Into<String>, response: HttpResponse) {
        self.lock()
            .routes
            .insert((method, url.into()), Reply::Respond(response));
    }

    /// Answer `method url` with a JSON body and status 200.
    pub fn respond_json(&self, method: HttpMethod, url: impl Into<String>, body: &str) {
        let response = HttpResponse::new(200)
            .with_header("content-type", "application/json")
            .with_body(body.as_bytes().to_vec());
        self.respond(method, url, response);
    }

    /// Make `method url` fail below HTTP.
    pub fn fail(&self, method: HttpMethod, url: impl Into<String>, failure: MockFailure) {
        self.lock()
            .routes
            .insert((method, url.into()), Reply::Fail(failure));
    }

    /// Every request sent so far, oldest first.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.lock().requests.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let reply = {
            let mut inner = self.lock();
            let key = (request.method, request.url.clone());
            let reply = inner.routes.get(&key).cloned();
            inner.requests.push(request);
            reply
        };

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match reply {
            Some(Reply::Respond(response)) => Ok(response),
            Some(Reply::Fail(MockFailure::Timeout)) => Err(TransportError::Timeout),
            Some(Reply::Fail(MockFailure::Cancelled)) => Err(TransportError::Cancelled),
            Some(Reply::Fail(MockFailure::ConnectionRefused)) => {
                Err(TransportError::Connect("connection refused".to_string()))
            }
            None => Ok(HttpResponse::new(404)),
        }
    }
}
