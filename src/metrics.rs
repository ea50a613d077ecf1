use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder};

const NAMESPACE: &str = "msglog";

/// Prometheus counters for what happened to each request's log record.
///
/// Cloning shares the underlying collectors, so one set of metrics can be
/// handed to several loggers and to whatever exposes the registry.
#[derive(Clone)]
pub struct MiddlewareMetrics {
    registry: Registry,
    requests: IntCounter,
    published: IntCounter,
    publish_failures: IntCounter,
    encode_failures: IntCounter,
    observation_failures: IntCounter,
    bytes_published: IntCounter,
    response_time: Histogram,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub published: u64,
    pub publish_failures: u64,
    pub encode_failures: u64,
    pub observation_failures: u64,
    pub bytes_published: u64,
    pub response_time_count: u64,
}

impl MiddlewareMetrics {
    /// Creates the collectors in a fresh registry.
    pub fn new() -> prometheus::Result<Self> {
        Self::with_registry(Registry::new())
    }

    /// Registers the collectors in an existing registry.
    pub fn with_registry(registry: Registry) -> prometheus::Result<Self> {
        let requests = counter("requests_total", "Requests seen by the middleware")?;
        let published = counter(
            "records_published_total",
            "Log records acknowledged by Kafka",
        )?;
        let publish_failures = counter(
            "publish_failures_total",
            "Log records Kafka did not acknowledge",
        )?;
        let encode_failures = counter(
            "encode_failures_total",
            "Log entries that could not be serialized",
        )?;
        let observation_failures = counter(
            "observation_failures_total",
            "Request bodies that could not be logged",
        )?;
        let bytes_published = counter(
            "published_bytes_total",
            "Bytes of acknowledged log records",
        )?;
        let response_time = Histogram::with_opts(
            HistogramOpts::new("response_time_seconds", "Time spent in the next handler")
                .namespace(NAMESPACE)
                .buckets(vec![
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
                ]),
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(published.clone()))?;
        registry.register(Box::new(publish_failures.clone()))?;
        registry.register(Box::new(encode_failures.clone()))?;
        registry.register(Box::new(observation_failures.clone()))?;
        registry.register(Box::new(bytes_published.clone()))?;
        registry.register(Box::new(response_time.clone()))?;

        Ok(Self {
            registry,
            requests,
            published,
            publish_failures,
            encode_failures,
            observation_failures,
            bytes_published,
            response_time,
        })
    }

    pub fn record_request(&self) {
        self.requests.inc();
    }

    pub fn record_response_time(&self, seconds: f64) {
        self.response_time.observe(seconds);
    }

    pub fn record_published(&self, bytes: usize) {
        self.published.inc();
        self.bytes_published.inc_by(u64::try_from(bytes).unwrap_or(u64::MAX));
    }

    pub fn record_publish_failure(&self) {
        self.publish_failures.inc();
    }

    pub fn record_encode_failure(&self) {
        self.encode_failures.inc();
    }

    pub fn record_observation_failure(&self) {
        self.observation_failures.inc();
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Prometheus text exposition format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer).unwrap_or(());
        String::from_utf8(buffer).unwrap_or_default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.get(),
            published: self.published.get(),
            publish_failures: self.publish_failures.get(),
            encode_failures: self.encode_failures.get(),
            observation_failures: self.observation_failures.get(),
            bytes_published: self.bytes_published.get(),
            response_time_count: self.response_time.get_sample_count(),
        }
    }
}

impl std::fmt::Debug for MiddlewareMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareMetrics")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

fn counter(name: &str, help: &str) -> prometheus::Result<IntCounter> {
    IntCounter::with_opts(Opts::new(name, help).namespace(NAMESPACE))
}
