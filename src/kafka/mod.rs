pub mod key_strategy;
pub mod producer;
pub mod tls;

#[cfg(test)]
mod tests;

pub use key_strategy::PartitionKey;
pub use producer::{Delivery, KafkaProducer, Publisher};
pub use tls::TlsSettings;

/// Every log record goes to this topic.
pub const TOPIC: &str = "msglog";
