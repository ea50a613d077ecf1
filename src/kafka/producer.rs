use crate::config::KafkaConfig;
use crate::error::PublishError;
use crate::kafka::TlsSettings;
use crate::{Error, Result};
use futures::future::BoxFuture;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use rdkafka::ClientConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Leader acknowledgment only; the full ISR is not awaited.
pub const ACKS: &str = "1";
pub const COMPRESSION: &str = "snappy";
/// Records are held client-side for at most this long before a batch is sent.
pub const LINGER_MS: u64 = 500;

/// Where the broker stored an acknowledged record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub partition: i32,
    pub offset: i64,
}

/// Publish-and-acknowledge capability shared by every in-flight request.
///
/// Implementations must tolerate concurrent `publish` calls on a shared
/// reference without external locking.
pub trait Publisher: Send + Sync {
    fn publish<'a>(
        &'a self,
        topic: &'a str,
        key: Option<&'a str>,
        value: &'a [u8],
    ) -> BoxFuture<'a, std::result::Result<Delivery, PublishError>>;
}

impl<P: Publisher + ?Sized> Publisher for Arc<P> {
    fn publish<'a>(
        &'a self,
        topic: &'a str,
        key: Option<&'a str>,
        value: &'a [u8],
    ) -> BoxFuture<'a, std::result::Result<Delivery, PublishError>> {
        (**self).publish(topic, key, value)
    }
}

/// The single long-lived connection to the Kafka cluster.
#[derive(Clone)]
pub struct KafkaProducer {
    producer: FutureProducer,
    publish_timeout: Duration,
    secured: bool,
}

impl KafkaProducer {
    /// Creates the producer without contacting the cluster.
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        config.validate()?;

        let tls = match &config.tls {
            Some(tls) => TlsSettings::from_config(tls)?,
            None => None,
        };

        let producer: FutureProducer = client_config(config, tls.as_ref())
            .create()
            .map_err(Error::Kafka)?;

        Ok(Self {
            producer,
            publish_timeout: config.publish_timeout(),
            secured: tls.is_some(),
        })
    }

    /// Creates the producer and checks that the cluster answers a metadata
    /// request within `connectTimeoutMs`.
    #[instrument(skip(config), fields(bootstrap = %config.bootstrap_url))]
    pub async fn connect(config: &KafkaConfig) -> Result<Self> {
        let producer = Self::new(config)?;
        let brokers = producer.fetch_broker_count(config.connect_timeout()).await?;

        info!(
            brokers,
            secured = producer.secured,
            acks = ACKS,
            compression = COMPRESSION,
            linger_ms = LINGER_MS,
            "Connected to Kafka cluster"
        );

        Ok(producer)
    }

    async fn fetch_broker_count(&self, timeout: Duration) -> Result<usize> {
        let producer = self.producer.clone();

        tokio::task::spawn_blocking(move || {
            producer
                .client()
                .fetch_metadata(None, timeout)
                .map(|metadata| metadata.brokers().len())
        })
        .await
        .map_err(|e| Error::Connection(format!("metadata task failed: {}", e)))?
        .map_err(|e| Error::Connection(format!("cluster unreachable: {}", e)))
    }

    pub fn is_secured(&self) -> bool {
        self.secured
    }

    /// Publishes one record and waits for the leader's acknowledgment.
    pub async fn send(
        &self,
        topic: &str,
        key: Option<&str>,
        payload: &[u8],
    ) -> std::result::Result<Delivery, PublishError> {
        let mut record = FutureRecord::<str, [u8]>::to(topic).payload(payload);
        if let Some(key) = key {
            record = record.key(key);
        }

        let delivery = tokio::time::timeout(
            self.publish_timeout,
            self.producer.send(record, Timeout::After(self.publish_timeout)),
        )
        .await
        .map_err(|_| PublishError::Timeout(self.publish_timeout))?
        .map_err(|(e, _)| PublishError::Kafka(e))?;

        let (partition, offset) = delivery;
        debug!(topic, partition, offset, "Record acknowledged");

        Ok(Delivery { partition, offset })
    }
}

impl Publisher for KafkaProducer {
    fn publish<'a>(
        &'a self,
        topic: &'a str,
        key: Option<&'a str>,
        value: &'a [u8],
    ) -> BoxFuture<'a, std::result::Result<Delivery, PublishError>> {
        Box::pin(self.send(topic, key, value))
    }
}

pub(crate) fn client_config(config: &KafkaConfig, tls: Option<&TlsSettings>) -> ClientConfig {
    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", config.bootstrap_url.trim())
        .set("acks", ACKS)
        .set("compression.type", COMPRESSION)
        .set("linger.ms", LINGER_MS.to_string())
        .set("message.timeout.ms", config.publish_timeout_ms.to_string());

    if let Some(tls) = tls {
        tls.apply(&mut client_config);
    }

    client_config
}
