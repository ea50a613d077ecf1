use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tracing::debug;

/// How the partition key of a published log record is chosen.
///
/// Records sharing a key land on the same partition, so keying by client
/// keeps each client's records in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PartitionKey {
    /// The client's IP address. The port is dropped so that separate
    /// connections from one client share a partition.
    #[default]
    #[serde(alias = "clientaddress")]
    ClientAddress,
    /// The same key for every record.
    Fixed(String),
}

impl PartitionKey {
    pub fn extract_key(&self, client_address: &str) -> Option<String> {
        match self {
            PartitionKey::ClientAddress => client_ip(client_address),
            PartitionKey::Fixed(key) => Some(key.clone()),
        }
    }
}

fn client_ip(client_address: &str) -> Option<String> {
    if client_address.is_empty() {
        debug!("No client address available for key extraction");
        return None;
    }

    match client_address.parse::<SocketAddr>() {
        Ok(addr) => Some(addr.ip().to_string()),
        // Not "ip:port"; use whatever the host gave us.
        Err(_) => Some(client_address.to_string()),
    }
}
