pub mod config;
pub mod entry;
pub mod error;
pub mod metrics;
pub mod middleware;

pub mod kafka;

pub use config::Config;
pub use entry::{LogEntry, LogRecord};
pub use error::{EncodeError, Error, ObservationError, PublishError, Result};
pub use kafka::{Delivery, KafkaProducer, PartitionKey, Publisher};
pub use metrics::{MetricsSnapshot, MiddlewareMetrics};
pub use middleware::{handler_fn, ClientAddr, Handler, RequestLogger};
