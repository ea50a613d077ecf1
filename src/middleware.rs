//! The request-logging middleware.
//!
//! [`RequestLogger`] sits in a chain of [`Handler`]s. For every request it
//! forwards the request untouched to the next handler, times that call,
//! builds a [`LogEntry`] describing the exchange and publishes it to the
//! `msglog` topic before handing the response back. Logging problems are
//! recorded in [`MiddlewareMetrics`] and in `tracing` events; they never
//! change the response the caller gets.
//!
//! # Example
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use http::{Request, Response};
//! use msglog_middleware::config::Config;
//! use msglog_middleware::middleware::{handler_fn, Handler, RequestLogger};
//!
//! # async fn example() -> msglog_middleware::Result<()> {
//! let config = Config::from_file("config.json")?;
//! let next = handler_fn(|_req: Request<Bytes>| async { Response::new(Bytes::from("ok")) });
//! let logger = RequestLogger::new(next, &config, "msglog").await?;
//!
//! let response = logger.handle(Request::new(Bytes::new())).await;
//! assert_eq!(response.headers()["x-request-id"], "1");
//! # Ok(())
//! # }
//! ```

use crate::config::Config;
use crate::entry::{capture_headers, seconds, LogEntry, LogRecord};
use crate::error::ObservationError;
use crate::kafka::{Delivery, KafkaProducer, PartitionKey, Publisher, TOPIC};
use crate::metrics::MiddlewareMetrics;
use crate::Result;
use bytes::Bytes;
use futures::future::BoxFuture;
use http::header::{HeaderName, HeaderValue, HOST};
use http::{Request, Response};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Marker header added to every response. The value is a constant, not a
/// per-request identifier.
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");
pub const REQUEST_ID_VALUE: &str = "1";

/// The connected peer's address, attached by the host as a request
/// extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientAddr(pub SocketAddr);

/// One step in the handler chain.
pub trait Handler: Send + Sync {
    fn handle(&self, request: Request<Bytes>) -> BoxFuture<'_, Response<Bytes>>;
}

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn handle(&self, request: Request<Bytes>) -> BoxFuture<'_, Response<Bytes>> {
        (**self).handle(request)
    }
}

/// A [`Handler`] backed by an async closure.
#[derive(Clone)]
pub struct HandlerFn<F> {
    f: F,
}

pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Request<Bytes>) -> Fut + Send + Sync,
    Fut: Future<Output = Response<Bytes>> + Send + 'static,
{
    HandlerFn { f }
}

impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Request<Bytes>) -> Fut + Send + Sync,
    Fut: Future<Output = Response<Bytes>> + Send + 'static,
{
    fn handle(&self, request: Request<Bytes>) -> BoxFuture<'_, Response<Bytes>> {
        Box::pin((self.f)(request))
    }
}

pub struct RequestLogger<N, P> {
    next: N,
    publisher: P,
    name: String,
    partition_key: PartitionKey,
    metrics: MiddlewareMetrics,
    log_bodies: bool,
}

impl<N: Handler> RequestLogger<N, KafkaProducer> {
    /// Validates `config`, connects to the cluster and wraps `next`.
    ///
    /// Fails on an empty `bootstrapUrl` before any connection is attempted,
    /// on unreadable TLS material, and when the cluster can't be reached.
    pub async fn new(next: N, config: &Config, name: impl Into<String>) -> Result<Self> {
        config.validate()?;
        let producer = KafkaProducer::connect(&config.kafka).await?;
        Self::with_publisher(next, producer, config, name)
    }
}

impl<N: Handler, P: Publisher> RequestLogger<N, P> {
    pub fn with_publisher(
        next: N,
        publisher: P,
        config: &Config,
        name: impl Into<String>,
    ) -> Result<Self> {
        config.validate()?;

        let name = name.into();
        info!(
            middleware = %name,
            bootstrap = %config.kafka.bootstrap_url,
            partition_key = ?config.kafka.partition_key,
            "Request logger ready"
        );

        Ok(Self {
            next,
            publisher,
            name,
            partition_key: config.kafka.partition_key.clone(),
            metrics: MiddlewareMetrics::new()?,
            log_bodies: false,
        })
    }

    /// Reports into `metrics` instead of a private registry. Clones share
    /// their collectors, so several loggers can feed one registry.
    pub fn with_metrics(mut self, metrics: MiddlewareMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Emits request headers and the pretty-printed JSON body as debug
    /// events.
    pub fn with_body_logging(mut self, enabled: bool) -> Self {
        self.log_bodies = enabled;
        self
    }

    pub fn metrics(&self) -> &MiddlewareMetrics {
        &self.metrics
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn serve(&self, request: Request<Bytes>) -> Response<Bytes> {
        self.metrics.record_request();

        if self.log_bodies {
            if let Err(e) = self.observe(&request) {
                self.metrics.record_observation_failure();
                warn!(middleware = %self.name, error = %e, "Could not log request body");
            }
        }

        let method = request.method().to_string();
        let host = host_of(&request);
        let path = request.uri().path().to_string();
        let client_address = request
            .extensions()
            .get::<ClientAddr>()
            .map(|addr| addr.0.to_string())
            .unwrap_or_default();
        let headers = capture_headers(request.headers());

        let start = Instant::now();
        let mut response = self.next.handle(request).await;
        let elapsed = start.elapsed();
        self.metrics.record_response_time(seconds(elapsed));

        let entry = LogEntry::new(LogRecord {
            method,
            host,
            path,
            client_address,
            response_time_seconds: seconds(elapsed),
            headers,
        });
        self.publish(&entry).await;

        response.headers_mut().insert(
            REQUEST_ID_HEADER,
            HeaderValue::from_static(REQUEST_ID_VALUE),
        );
        response
    }

    async fn publish(&self, entry: &LogEntry) -> Option<Delivery> {
        let payload = match entry.encode() {
            Ok(payload) => payload,
            Err(e) => {
                self.metrics.record_encode_failure();
                error!(middleware = %self.name, error = %e, "Failed to encode log entry");
                return None;
            }
        };

        let key = self
            .partition_key
            .extract_key(&entry.record().client_address);

        match self.publisher.publish(TOPIC, key.as_deref(), &payload).await {
            Ok(delivery) => {
                self.metrics.record_published(payload.len());
                debug!(
                    middleware = %self.name,
                    topic = TOPIC,
                    partition = delivery.partition,
                    offset = delivery.offset,
                    "Published log entry"
                );
                Some(delivery)
            }
            Err(e) => {
                self.metrics.record_publish_failure();
                error!(
                    middleware = %self.name,
                    topic = TOPIC,
                    key = ?key,
                    error = %e,
                    "Failed to publish log entry"
                );
                None
            }
        }
    }

    fn observe(&self, request: &Request<Bytes>) -> std::result::Result<(), ObservationError> {
        debug!(middleware = %self.name, headers = ?request.headers(), "Request headers");

        let body = request.body();
        if body.is_empty() {
            debug!(middleware = %self.name, "No body supplied");
            return Ok(());
        }

        let value: serde_json::Value = serde_json::from_slice(body)?;
        let pretty = serde_json::to_string_pretty(&value)?;
        debug!(middleware = %self.name, body = %pretty, "Request body");
        Ok(())
    }
}

impl<N: Handler, P: Publisher> Handler for RequestLogger<N, P> {
    fn handle(&self, request: Request<Bytes>) -> BoxFuture<'_, Response<Bytes>> {
        Box::pin(self.serve(request))
    }
}

fn host_of(request: &Request<Bytes>) -> String {
    request
        .headers()
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| request.uri().authority().map(|authority| authority.as_str()))
        .unwrap_or_default()
        .to_string()
}
