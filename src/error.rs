//! Error types and result handling for msglog-middleware.
//!
//! [`Error`] covers everything that can fail while the middleware is being
//! assembled: configuration, TLS material, and the initial broker
//! connection. Failures that happen while a request is being served have
//! their own types ([`PublishError`], [`EncodeError`], [`ObservationError`])
//! because they are recovered inside the middleware and never reach the
//! HTTP caller.
//!
//! # Example
//!
//! ```rust
//! use msglog_middleware::{Error, Result};
//!
//! fn build() -> Result<()> {
//!     Err(Error::Config("must provide a bootstrapUrl".to_string()))
//! }
//!
//! match build() {
//!     Ok(()) => println!("built"),
//!     Err(Error::Config(msg)) => eprintln!("Configuration error: {}", msg),
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// The main error type for msglog-middleware construction.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The configuration source could not be loaded or deserialized.
    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    /// TLS material was configured but could not be read or parsed.
    #[error("TLS error: {path}: {message}")]
    Tls {
        /// File that failed
        path: PathBuf,
        /// What went wrong with it
        message: String,
    },

    /// Kafka client error while creating the producer.
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// The broker cluster could not be reached at startup.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The metrics collectors could not be created or registered.
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// A convenient Result type alias for msglog-middleware operations.
///
/// This is equivalent to `std::result::Result<T, msglog_middleware::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// A record could not be published and acknowledged.
#[derive(Error, Debug)]
pub enum PublishError {
    /// The broker client rejected or failed to deliver the record.
    #[error("Kafka delivery failed: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// No acknowledgment arrived within the publish timeout.
    #[error("Publish timed out after {0:?}")]
    Timeout(Duration),

    /// Any other publisher failure.
    #[error("Publish failed: {0}")]
    Other(String),
}

/// A log entry could not be serialized.
///
/// Cloneable so the outcome can be memoized on the entry and handed out on
/// every access.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Serialization error: {0}")]
pub struct EncodeError(pub String);

impl From<serde_json::Error> for EncodeError {
    fn from(e: serde_json::Error) -> Self {
        EncodeError(e.to_string())
    }
}

/// The request could not be observed for logging purposes.
///
/// Never fatal: the request is still forwarded.
#[derive(Error, Debug)]
pub enum ObservationError {
    /// The body is not valid JSON and can't be pretty-printed.
    #[error("Body is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}
