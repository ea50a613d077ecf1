//! The log record published for one request/response exchange.
//!
//! A [`LogEntry`] is built once per request, after the forwarded call has
//! returned, and is never modified afterwards. Its JSON encoding is computed
//! on first access and cached together with the outcome, so a failed
//! encoding is not retried and a successful one is never recomputed.

use crate::error::EncodeError;
use bytes::Bytes;
use http::HeaderMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

/// The fields of a log entry, as they appear on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub method: String,
    pub host: String,
    pub path: String,
    pub client_address: String,
    pub response_time_seconds: f64,
    /// Every value of every header; repeated headers keep all their values
    /// in arrival order.
    pub headers: BTreeMap<String, Vec<String>>,
}

type Encoder = fn(&LogRecord) -> Result<Bytes, EncodeError>;

#[derive(Debug)]
pub struct LogEntry {
    record: LogRecord,
    encoder: Encoder,
    encoded: OnceLock<Result<Bytes, EncodeError>>,
    serializations: AtomicUsize,
}

impl LogEntry {
    pub fn new(record: LogRecord) -> Self {
        Self::with_encoder(record, encode_json)
    }

    pub(crate) fn with_encoder(record: LogRecord, encoder: Encoder) -> Self {
        Self {
            record,
            encoder,
            encoded: OnceLock::new(),
            serializations: AtomicUsize::new(0),
        }
    }

    pub fn record(&self) -> &LogRecord {
        &self.record
    }

    /// Serialized JSON, computed at most once.
    pub fn encode(&self) -> Result<Bytes, EncodeError> {
        self.encoded
            .get_or_init(|| {
                self.serializations.fetch_add(1, Ordering::Relaxed);
                (self.encoder)(&self.record)
            })
            .clone()
    }

    /// Byte length of the encoding.
    pub fn len(&self) -> Result<usize, EncodeError> {
        self.encode().map(|bytes| bytes.len())
    }

    pub fn is_empty(&self) -> Result<bool, EncodeError> {
        self.len().map(|len| len == 0)
    }

    pub(crate) fn serialization_count(&self) -> usize {
        self.serializations.load(Ordering::Relaxed)
    }
}

impl PartialEq for LogEntry {
    fn eq(&self, other: &Self) -> bool {
        self.record == other.record
    }
}

impl From<LogRecord> for LogEntry {
    fn from(record: LogRecord) -> Self {
        Self::new(record)
    }
}

fn encode_json(record: &LogRecord) -> Result<Bytes, EncodeError> {
    serde_json::to_vec(record)
        .map(Bytes::from)
        .map_err(EncodeError::from)
}

pub fn capture_headers(headers: &HeaderMap) -> BTreeMap<String, Vec<String>> {
    let mut captured = BTreeMap::new();
    for name in headers.keys() {
        let values = headers
            .get_all(name)
            .iter()
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
            .collect();
        captured.insert(name.as_str().to_string(), values);
    }
    captured
}

pub fn seconds(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64()
}
