//! Secured transport for the broker connection.
//!
//! [`TlsSettings::from_config`] turns the `tls` section of the configuration
//! into either a complete descriptor or nothing at all. PEM material is read
//! up front and handed to librdkafka inline, so an unreadable file fails
//! middleware construction instead of surfacing later from inside the client.

use crate::config::TlsConfig;
use crate::{Error, Result};
use rdkafka::ClientConfig;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Clone, PartialEq, Eq)]
pub struct TlsSettings {
    ca_pem: String,
    cert_pem: String,
    key_pem: String,
    verify_peer: bool,
}

impl TlsSettings {
    /// Returns `Ok(None)` unless all of `caFile`, `certFile` and `keyFile`
    /// are set.
    pub fn from_config(tls: &TlsConfig) -> Result<Option<Self>> {
        if !tls.is_complete() {
            if tls.is_partial() {
                warn!("Incomplete TLS configuration; connecting without TLS");
            }
            return Ok(None);
        }

        let cert_pem = read_pem(&tls.cert_file, "CERTIFICATE")?;
        let key_pem = read_pem(&tls.key_file, "PRIVATE KEY")?;
        let ca_pem = read_pem(&tls.ca_file, "CERTIFICATE")?;

        debug!(
            ca_file = %tls.ca_file.display(),
            cert_file = %tls.cert_file.display(),
            verify_ssl = tls.verify_ssl,
            "Loaded TLS material"
        );
        if !tls.verify_ssl {
            warn!(
                ca_file = %tls.ca_file.display(),
                "verifySsl is false; the broker's certificate and hostname are not verified"
            );
        }

        Ok(Some(Self {
            ca_pem,
            cert_pem,
            key_pem,
            verify_peer: tls.verify_ssl,
        }))
    }

    pub fn verify_peer(&self) -> bool {
        self.verify_peer
    }

    pub fn apply(&self, client_config: &mut ClientConfig) {
        client_config
            .set("security.protocol", "ssl")
            .set("ssl.ca.pem", &self.ca_pem)
            .set("ssl.certificate.pem", &self.cert_pem)
            .set("ssl.key.pem", &self.key_pem)
            .set(
                "enable.ssl.certificate.verification",
                self.verify_peer.to_string(),
            );

        if !self.verify_peer {
            client_config.set("ssl.endpoint.identification.algorithm", "none");
        }
    }
}

// Key material stays out of logs.
impl fmt::Debug for TlsSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsSettings")
            .field("verify_peer", &self.verify_peer)
            .finish_non_exhaustive()
    }
}

fn read_pem(path: &Path, label: &str) -> Result<String> {
    let contents = fs::read_to_string(path).map_err(|e| Error::Tls {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let has_block = contents
        .lines()
        .any(|line| line.starts_with("-----BEGIN ") && line.contains(label))
        && contents.contains("-----END ");

    if !has_block {
        return Err(Error::Tls {
            path: path.to_path_buf(),
            message: format!("no PEM {} block found", label),
        });
    }

    Ok(contents)
}
