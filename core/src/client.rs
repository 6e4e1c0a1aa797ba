//! Typed API client composed from the request/response pipeline.
//!
//! # Design
//! `ApiClient` holds only collaborators fixed at construction: transport,
//! codec, hooks and diagnostic config. No per-call state lives on the client,
//! so one instance can serve any number of concurrent calls.
//!
//! Every verb runs the same sequence: build the request, attach a body, send,
//! validate, decode. One `info` line is logged when the call starts, one
//! `debug` line when a response arrives, one `error` line on failure, and one
//! analytics record when it finishes. A call whose future is dropped before it
//! completes is reported as a cancelled `NetworkError`; one that panics is
//! reported as `Unknown`.
//!
//! Each verb also has a `*_with_callback` form that spawns the awaitable call
//! on a tokio runtime and hands its result to a callback exactly once.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::runtime::Handle;

use crate::codec::{Codec, JsonCodec};
use crate::config::{ClientConfig, TransportConfig};
use crate::endpoint::Endpoint;
use crate::error::ApiError;
use crate::hooks::{AnalyticsRecord, AnalyticsSink, Logger, UnauthorizedHandler};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::multipart::{attach_multipart, MultipartPayload};
use crate::request::{attach_json_body, build_request};
use crate::response::{decode, validate, NoContent};
use crate::transport::{Transport, TransportError};

struct Inner<C> {
    transport: Arc<dyn Transport>,
    codec: C,
    logger: Option<Arc<dyn Logger>>,
    analytics: Option<Arc<dyn AnalyticsSink>>,
    on_unauthorized: Option<Arc<dyn UnauthorizedHandler>>,
    config: ClientConfig,
    runtime: Option<Handle>,
}

/// HTTP client for application-defined endpoints.
///
/// Cheap to clone; clones share the same collaborators.
pub struct ApiClient<C: Codec = JsonCodec> {
    inner: Arc<Inner<C>>,
}

impl<C: Codec> Clone for ApiClient<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Codec> std::fmt::Debug for ApiClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("config", &self.inner.config)
            .field("logger", &self.inner.logger.is_some())
            .field("analytics", &self.inner.analytics.is_some())
            .field("on_unauthorized", &self.inner.on_unauthorized.is_some())
            .finish_non_exhaustive()
    }
}

impl ApiClient<JsonCodec> {
    /// Client with the JSON codec, no hooks and the given transport.
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport: Arc::new(transport),
                codec: JsonCodec::new(),
                logger: None,
                analytics: None,
                on_unauthorized: None,
                config: ClientConfig::default(),
                runtime: None,
            }),
        }
    }

    pub fn builder() -> ApiClientBuilder<JsonCodec> {
        ApiClientBuilder::default()
    }
}

impl<C: Codec> ApiClient<C> {
    // === Awaitable verbs ===

    /// GET `endpoint` and decode the body as `R`.
    pub async fn get<R>(&self, endpoint: &impl Endpoint) -> Result<R, ApiError>
    where
        R: DeserializeOwned + 'static,
    {
        self.execute(endpoint, HttpMethod::Get, None, |_| Ok(()), |response| self.decode(&response))
            .await
    }

    /// GET `endpoint` and return the response without decoding it.
    pub async fn get_raw(&self, endpoint: &impl Endpoint) -> Result<HttpResponse, ApiError> {
        self.execute(endpoint, HttpMethod::Get, None, |_| Ok(()), Ok).await
    }

    /// POST `body` as JSON and decode the body of the response as `R`.
    pub async fn post<B, R>(&self, endpoint: &impl Endpoint, body: &B) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned + 'static,
    {
        self.execute(
            endpoint,
            HttpMethod::Post,
            None,
            |request| self.attach_body(request, body),
            |response| self.decode(&response),
        )
        .await
    }

    /// POST `body` as JSON for an endpoint that answers with no content.
    pub async fn post_raw<B>(&self, endpoint: &impl Endpoint, body: &B) -> Result<HttpResponse, ApiError>
    where
        B: Serialize + ?Sized,
    {
        self.execute(
            endpoint,
            HttpMethod::Post,
            None,
            |request| self.attach_body(request, body),
            |response| self.expect_no_content(response),
        )
        .await
    }

    /// PUT `body` as JSON and decode the body of the response as `R`.
    pub async fn put<B, R>(&self, endpoint: &impl Endpoint, body: &B) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned + 'static,
    {
        self.execute(
            endpoint,
            HttpMethod::Put,
            None,
            |request| self.attach_body(request, body),
            |response| self.decode(&response),
        )
        .await
    }

    /// PUT `body` as JSON for an endpoint that answers with no content.
    pub async fn put_raw<B>(&self, endpoint: &impl Endpoint, body: &B) -> Result<HttpResponse, ApiError>
    where
        B: Serialize + ?Sized,
    {
        self.execute(
            endpoint,
            HttpMethod::Put,
            None,
            |request| self.attach_body(request, body),
            |response| self.expect_no_content(response),
        )
        .await
    }

    /// DELETE `endpoint` and decode the body of the response as `R`.
    pub async fn delete<R>(&self, endpoint: &impl Endpoint) -> Result<R, ApiError>
    where
        R: DeserializeOwned + 'static,
    {
        self.execute(endpoint, HttpMethod::Delete, None, |_| Ok(()), |response| self.decode(&response))
            .await
    }

    /// DELETE `endpoint` when the server answers with no content.
    pub async fn delete_raw(&self, endpoint: &impl Endpoint) -> Result<HttpResponse, ApiError> {
        self.execute(
            endpoint,
            HttpMethod::Delete,
            None,
            |_| Ok(()),
            |response| self.expect_no_content(response),
        )
        .await
    }

    /// Send `payload` as `multipart/form-data` with `method`.
    ///
    /// The response is validated but never decoded.
    pub async fn upload(
        &self,
        endpoint: &impl Endpoint,
        method: HttpMethod,
        payload: &MultipartPayload,
    ) -> Result<HttpResponse, ApiError> {
        self.execute(
            endpoint,
            method,
            Some(payload.string_value()),
            |request| attach_multipart(request, payload),
            Ok,
        )
        .await
    }

    // === Callback verbs ===

    pub fn get_with_callback<R, E, F>(&self, endpoint: E, callback: F)
    where
        R: DeserializeOwned + Send + 'static,
        E: Endpoint + 'static,
        F: FnOnce(Result<R, ApiError>) + Send + 'static,
    {
        let client = self.clone();
        self.spawn_with_callback(
            HttpMethod::Get,
            endpoint.identity(),
            async move { client.get(&endpoint).await },
            callback,
        );
    }

    pub fn get_raw_with_callback<E, F>(&self, endpoint: E, callback: F)
    where
        E: Endpoint + 'static,
        F: FnOnce(Result<HttpResponse, ApiError>) + Send + 'static,
    {
        let client = self.clone();
        self.spawn_with_callback(
            HttpMethod::Get,
            endpoint.identity(),
            async move { client.get_raw(&endpoint).await },
            callback,
        );
    }

    pub fn post_with_callback<B, R, E, F>(&self, endpoint: E, body: B, callback: F)
    where
        B: Serialize + Send + Sync + 'static,
        R: DeserializeOwned + Send + 'static,
        E: Endpoint + 'static,
        F: FnOnce(Result<R, ApiError>) + Send + 'static,
    {
        let client = self.clone();
        self.spawn_with_callback(
            HttpMethod::Post,
            endpoint.identity(),
            async move { client.post(&endpoint, &body).await },
            callback,
        );
    }

    pub fn post_raw_with_callback<B, E, F>(&self, endpoint: E, body: B, callback: F)
    where
        B: Serialize + Send + Sync + 'static,
        E: Endpoint + 'static,
        F: FnOnce(Result<HttpResponse, ApiError>) + Send + 'static,
    {
        let client = self.clone();
        self.spawn_with_callback(
            HttpMethod::Post,
            endpoint.identity(),
            async move { client.post_raw(&endpoint, &body).await },
            callback,
        );
    }

    pub fn put_with_callback<B, R, E, F>(&self, endpoint: E, body: B, callback: F)
    where
        B: Serialize + Send + Sync + 'static,
        R: DeserializeOwned + Send + 'static,
        E: Endpoint + 'static,
        F: FnOnce(Result<R, ApiError>) + Send + 'static,
    {
        let client = self.clone();
        self.spawn_with_callback(
            HttpMethod::Put,
            endpoint.identity(),
            async move { client.put(&endpoint, &body).await },
            callback,
        );
    }

    pub fn put_raw_with_callback<B, E, F>(&self, endpoint: E, body: B, callback: F)
    where
        B: Serialize + Send + Sync + 'static,
        E: Endpoint + 'static,
        F: FnOnce(Result<HttpResponse, ApiError>) + Send + 'static,
    {
        let client = self.clone();
        self.spawn_with_callback(
            HttpMethod::Put,
            endpoint.identity(),
            async move { client.put_raw(&endpoint, &body).await },
            callback,
        );
    }

    pub fn delete_with_callback<R, E, F>(&self, endpoint: E, callback: F)
    where
        R: DeserializeOwned + Send + 'static,
        E: Endpoint + 'static,
        F: FnOnce(Result<R, ApiError>) + Send + 'static,
    {
        let client = self.clone();
        self.spawn_with_callback(
            HttpMethod::Delete,
            endpoint.identity(),
            async move { client.delete(&endpoint).await },
            callback,
        );
    }

    pub fn delete_raw_with_callback<E, F>(&self, endpoint: E, callback: F)
    where
        E: Endpoint + 'static,
        F: FnOnce(Result<HttpResponse, ApiError>) + Send + 'static,
    {
        let client = self.clone();
        self.spawn_with_callback(
            HttpMethod::Delete,
            endpoint.identity(),
            async move { client.delete_raw(&endpoint).await },
            callback,
        );
    }

    pub fn upload_with_callback<E, F>(
        &self,
        endpoint: E,
        method: HttpMethod,
        payload: MultipartPayload,
        callback: F,
    ) where
        E: Endpoint + 'static,
        F: FnOnce(Result<HttpResponse, ApiError>) + Send + 'static,
    {
        let client = self.clone();
        self.spawn_with_callback(
            method,
            endpoint.identity(),
            async move { client.upload(&endpoint, method, &payload).await },
            callback,
        );
    }

    // === Pipeline ===

    /// Run one call through the pipeline, firing every hook exactly once.
    ///
    /// `prepare` attaches the body to the built request and `finish` turns a
    /// validated response into the caller's value.
    async fn execute<T>(
        &self,
        endpoint: &dyn Endpoint,
        method: HttpMethod,
        detail: Option<String>,
        prepare: impl FnOnce(&mut HttpRequest) -> Result<(), ApiError>,
        finish: impl FnOnce(HttpResponse) -> Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        let mut trace = self.trace(method, endpoint.identity(), detail.as_deref());
        let result = self
            .send_and_validate(endpoint, method, prepare, &mut trace.status_code)
            .await
            .and_then(finish);
        trace.finish(&result);
        result
    }

    async fn send_and_validate(
        &self,
        endpoint: &dyn Endpoint,
        method: HttpMethod,
        prepare: impl FnOnce(&mut HttpRequest) -> Result<(), ApiError>,
        status_code: &mut Option<u16>,
    ) -> Result<HttpResponse, ApiError> {
        let mut request = build_request(endpoint, method)?;
        prepare(&mut request)?;

        let response = self
            .inner
            .transport
            .send(request)
            .await
            .map_err(network_error)?;
        *status_code = Some(response.status);

        if let Some(logger) = self.logger() {
            logger.debug(&format!(
                "{method} {} responded {}",
                endpoint.identity(),
                response.status
            ));
        }

        validate(response, endpoint, self.inner.on_unauthorized.as_deref())
    }

    fn attach_body<B>(&self, request: &mut HttpRequest, body: &B) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized,
    {
        let logger = self.body_logger(self.inner.config.log_request_bodies);
        attach_json_body(request, Some(body), &self.inner.codec, logger)
    }

    fn decode<R>(&self, response: &HttpResponse) -> Result<R, ApiError>
    where
        R: DeserializeOwned + 'static,
    {
        let logger = self.body_logger(self.inner.config.log_response_bodies);
        decode(&self.inner.codec, response, logger)
    }

    fn expect_no_content(&self, response: HttpResponse) -> Result<HttpResponse, ApiError> {
        self.decode::<NoContent>(&response)?;
        Ok(response)
    }

    fn spawn_with_callback<T, Fut, F>(
        &self,
        method: HttpMethod,
        identity: String,
        call: Fut,
        callback: F,
    ) where
        T: Send + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
        F: FnOnce(Result<T, ApiError>) + Send + 'static,
    {
        let Some(runtime) = self.inner.runtime.clone().or_else(|| Handle::try_current().ok()) else {
            tracing::error!(%method, endpoint = %identity, "no tokio runtime available to run the call");
            let result = Err(ApiError::Unknown);
            self.trace(method, identity, None).finish(&result);
            callback(result);
            return;
        };

        // A panic unwinds through the call's trace, which reports it.
        runtime.spawn(async move {
            let result = match AssertUnwindSafe(call).catch_unwind().await {
                Ok(result) => result,
                Err(_) => {
                    tracing::error!(%method, endpoint = %identity, "call panicked before completing");
                    Err(ApiError::Unknown)
                }
            };
            callback(result);
        });
    }

    fn trace(&self, method: HttpMethod, identity: String, detail: Option<&str>) -> CallTrace<'_> {
        CallTrace::start(
            self.logger(),
            self.inner.analytics.as_deref(),
            method,
            identity,
            detail,
        )
    }

    fn logger(&self) -> Option<&dyn Logger> {
        self.inner.logger.as_deref()
    }

    fn body_logger(&self, enabled: bool) -> Option<&dyn Logger> {
        if enabled {
            self.logger()
        } else {
            None
        }
    }
}

/// Hook bookkeeping for one call.
///
/// Reports exactly once: through `finish`, or on drop if the call future is
/// dropped before completing (cancellation) or unwinds (panic).
struct CallTrace<'a> {
    logger: Option<&'a dyn Logger>,
    analytics: Option<&'a dyn AnalyticsSink>,
    method: HttpMethod,
    identity: String,
    started_at: DateTime<Utc>,
    status_code: Option<u16>,
    reported: bool,
}

impl<'a> CallTrace<'a> {
    fn start(
        logger: Option<&'a dyn Logger>,
        analytics: Option<&'a dyn AnalyticsSink>,
        method: HttpMethod,
        identity: String,
        detail: Option<&str>,
    ) -> Self {
        let started_at = Utc::now();
        if let Some(logger) = logger {
            match detail {
                Some(detail) => logger.info(&format!("{method} {identity} started ({detail})")),
                None => logger.info(&format!("{method} {identity} started")),
            }
        }
        Self {
            logger,
            analytics,
            method,
            identity,
            started_at,
            status_code: None,
            reported: false,
        }
    }

    fn finish<T>(mut self, result: &Result<T, ApiError>) {
        self.report(result.as_ref().err());
    }

    fn report(&mut self, error: Option<&ApiError>) {
        self.reported = true;
        let finished_at = Utc::now();
        let error_message = error.map(ApiError::describe);

        if let (Some(message), Some(logger)) = (&error_message, self.logger) {
            logger.error(&format!("{} {} failed: {message}", self.method, self.identity));
        }

        if let Some(analytics) = self.analytics {
            analytics.record(AnalyticsRecord {
                endpoint: self.identity.clone(),
                method: self.method,
                started_at: self.started_at,
                finished_at,
                success: error.is_none(),
                status_code: self.status_code,
                error_message,
            });
        }
    }
}

impl Drop for CallTrace<'_> {
    fn drop(&mut self) {
        if self.reported {
            return;
        }
        let err = if std::thread::panicking() {
            ApiError::Unknown
        } else {
            network_error(TransportError::Cancelled)
        };
        self.report(Some(&err));
    }
}

fn network_error(err: TransportError) -> ApiError {
    ApiError::NetworkError(err.to_string())
}

/// Builder for `ApiClient`.
pub struct ApiClientBuilder<C: Codec = JsonCodec> {
    transport: Option<Arc<dyn Transport>>,
    transport_config: TransportConfig,
    codec: C,
    logger: Option<Arc<dyn Logger>>,
    analytics: Option<Arc<dyn AnalyticsSink>>,
    on_unauthorized: Option<Arc<dyn UnauthorizedHandler>>,
    config: ClientConfig,
    runtime: Option<Handle>,
}

impl Default for ApiClientBuilder<JsonCodec> {
    fn default() -> Self {
        Self {
            transport: None,
            transport_config: TransportConfig::default(),
            codec: JsonCodec::new(),
            logger: None,
            analytics: None,
            on_unauthorized: None,
            config: ClientConfig::default(),
            runtime: None,
        }
    }
}

impl<C: Codec> ApiClientBuilder<C> {
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Settings for the default reqwest transport. Ignored when a transport
    /// is supplied explicitly.
    pub fn transport_config(mut self, config: TransportConfig) -> Self {
        self.transport_config = config;
        self
    }

    pub fn codec<D: Codec>(self, codec: D) -> ApiClientBuilder<D> {
        ApiClientBuilder {
            transport: self.transport,
            transport_config: self.transport_config,
            codec,
            logger: self.logger,
            analytics: self.analytics,
            on_unauthorized: self.on_unauthorized,
            config: self.config,
            runtime: self.runtime,
        }
    }

    pub fn logger(mut self, logger: impl Logger + 'static) -> Self {
        self.logger = Some(Arc::new(logger));
        self
    }

    pub fn analytics(mut self, sink: impl AnalyticsSink + 'static) -> Self {
        self.analytics = Some(Arc::new(sink));
        self
    }

    pub fn on_unauthorized(mut self, handler: impl UnauthorizedHandler + 'static) -> Self {
        self.on_unauthorized = Some(Arc::new(handler));
        self
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Runtime used by the callback verbs. Defaults to the runtime current at
    /// the time of each call.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn build(self) -> Result<ApiClient<C>, TransportError> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport(&self.transport_config)?,
        };
        Ok(ApiClient {
            inner: Arc::new(Inner {
                transport,
                codec: self.codec,
                logger: self.logger,
                analytics: self.analytics,
                on_unauthorized: self.on_unauthorized,
                config: self.config,
                runtime: self.runtime,
            }),
        })
    }
}

#[cfg(feature = "reqwest")]
fn default_transport(config: &TransportConfig) -> Result<Arc<dyn Transport>, TransportError> {
    Ok(Arc::new(crate::transport::ReqwestTransport::new(config)?))
}

#[cfg(not(feature = "reqwest"))]
fn default_transport(_config: &TransportConfig) -> Result<Arc<dyn Transport>, TransportError> {
    Err(TransportError::Other("no transport configured".to_string()))
}
