use crate::kafka::producer::LINGER_MS;
use crate::kafka::PartitionKey;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub kafka: KafkaConfig,
}

// Keys loaded through the `config` crate may arrive lowercased, hence the
// aliases on every camelCase field.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KafkaConfig {
    #[serde(default, alias = "bootstrapurl")]
    pub bootstrap_url: String,
    #[serde(default)]
    pub tls: Option<TlsConfig>,
    #[serde(default, alias = "partitionkey")]
    pub partition_key: PartitionKey,
    #[serde(default = "default_publish_timeout_ms", alias = "publishtimeoutms")]
    pub publish_timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ms", alias = "connecttimeoutms")]
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfig {
    #[serde(default, alias = "cafile")]
    pub ca_file: PathBuf,
    #[serde(default, alias = "certfile")]
    pub cert_file: PathBuf,
    #[serde(default, alias = "keyfile")]
    pub key_file: PathBuf,
    /// Defaults to true. When false, neither the broker's certificate chain
    /// nor its hostname is verified.
    #[serde(default = "default_verify_ssl", alias = "verifyssl")]
    pub verify_ssl: bool,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            bootstrap_url: String::new(),
            tls: None,
            partition_key: PartitionKey::default(),
            publish_timeout_ms: default_publish_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            ca_file: PathBuf::new(),
            cert_file: PathBuf::new(),
            key_file: PathBuf::new(),
            verify_ssl: default_verify_ssl(),
        }
    }
}

impl Config {
    /// Loads configuration from a JSON, TOML or YAML file, with `MSGLOG_`
    /// environment overrides (`MSGLOG_KAFKA__BOOTSTRAPURL=...`).
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("MSGLOG")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.kafka.validate()
    }
}

impl KafkaConfig {
    pub fn new(bootstrap_url: impl Into<String>) -> Self {
        Self {
            bootstrap_url: bootstrap_url.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.bootstrap_url.trim().is_empty() {
            return Err(Error::Config("must provide a bootstrapUrl".to_string()));
        }
        // librdkafka refuses a message timeout that doesn't exceed linger.ms.
        if self.publish_timeout_ms <= LINGER_MS {
            return Err(Error::Config(format!(
                "publishTimeoutMs must be greater than the {} ms batching interval",
                LINGER_MS
            )));
        }
        Ok(())
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl TlsConfig {
    /// True only when all three files are named.
    pub fn is_complete(&self) -> bool {
        self.files().iter().all(|file| !file.as_os_str().is_empty())
    }

    /// True when at least one of the three files is named.
    pub fn is_partial(&self) -> bool {
        !self.is_complete() && self.files().iter().any(|file| !file.as_os_str().is_empty())
    }

    fn files(&self) -> [&Path; 3] {
        [
            self.ca_file.as_path(),
            self.cert_file.as_path(),
            self.key_file.as_path(),
        ]
    }
}

fn default_publish_timeout_ms() -> u64 {
    5_000
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_verify_ssl() -> bool {
    true
}
