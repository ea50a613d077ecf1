#![allow(dead_code)]

use bytes::Bytes;
use futures::future::BoxFuture;
use http::{Request, Response, StatusCode};
use msglog_middleware::config::{Config, KafkaConfig};
use msglog_middleware::{Delivery, LogRecord, PublishError, Publisher};
use std::env;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Configuration pointing at a broker that is never contacted.
pub fn get_test_config() -> Config {
    Config {
        kafka: KafkaConfig::new("broker.example:9092"),
    }
}

/// Configuration for tests that need a real cluster.
pub fn get_kafka_test_config() -> Config {
    Config {
        kafka: KafkaConfig::new(
            env::var("TEST_KAFKA_BROKERS").unwrap_or_else(|_| "localhost:9092".to_string()),
        ),
    }
}

#[derive(Debug, Clone)]
pub struct PublishedRecord {
    pub topic: String,
    pub key: Option<String>,
    pub value: Vec<u8>,
}

impl PublishedRecord {
    pub fn log_record(&self) -> LogRecord {
        serde_json::from_slice(&self.value).unwrap()
    }
}

/// Accepts everything and remembers what it was given.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    records: Mutex<Vec<PublishedRecord>>,
    next_offset: AtomicI64,
}

impl RecordingPublisher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn records(&self) -> Vec<PublishedRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl Publisher for RecordingPublisher {
    fn publish<'a>(
        &'a self,
        topic: &'a str,
        key: Option<&'a str>,
        value: &'a [u8],
    ) -> BoxFuture<'a, Result<Delivery, PublishError>> {
        Box::pin(async move {
            // Let other in-flight requests interleave with this one.
            tokio::task::yield_now().await;

            let offset = self.next_offset.fetch_add(1, Ordering::SeqCst);
            self.records.lock().unwrap().push(PublishedRecord {
                topic: topic.to_string(),
                key: key.map(str::to_string),
                value: value.to_vec(),
            });

            Ok(Delivery {
                partition: 0,
                offset,
            })
        })
    }
}

/// Simulates an unreachable cluster.
#[derive(Debug, Default)]
pub struct FailingPublisher {
    attempts: AtomicUsize,
}

impl FailingPublisher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Publisher for FailingPublisher {
    fn publish<'a>(
        &'a self,
        _topic: &'a str,
        _key: Option<&'a str>,
        _value: &'a [u8],
    ) -> BoxFuture<'a, Result<Delivery, PublishError>> {
        Box::pin(async move {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(PublishError::Other("broker unreachable".to_string()))
        })
    }
}

/// A next step that records every request it receives.
#[derive(Debug, Default)]
pub struct SeenRequests {
    requests: Mutex<Vec<Request<Bytes>>>,
}

impl SeenRequests {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, request: Request<Bytes>) {
        self.requests.lock().unwrap().push(request);
    }

    pub fn take(&self) -> Vec<Request<Bytes>> {
        std::mem::take(&mut *self.requests.lock().unwrap())
    }
}

pub fn empty_response(status: StatusCode) -> Response<Bytes> {
    let mut response = Response::new(Bytes::new());
    *response.status_mut() = status;
    response
}
