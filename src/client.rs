use crate::protocol::{Attributes, ClientInfo};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

/// A participant connected to a channel, local or remote.
///
/// Records are immutable; when a peer's attributes change the roster holds
/// a new record in place of the old one.
#[derive(Debug, Clone, PartialEq)]
pub struct Client {
    id: String,
    attributes: Attributes,
    is_host: bool,
    connect_time: u64,
}

impl Client {
    /// Create a client record stamped with the current time
    pub fn new(id: impl Into<String>, attributes: Attributes, is_host: bool) -> Self {
        Self {
            id: id.into(),
            attributes,
            is_host,
            connect_time: now_millis(),
        }
    }

    /// The id assigned by the remote service
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Attributes supplied by the client when it connected
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Look up a single attribute
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Whether this client hosts the channel
    pub fn is_host(&self) -> bool {
        self.is_host
    }

    /// Connect time in epoch milliseconds
    pub fn connect_time(&self) -> u64 {
        self.connect_time
    }
}

impl From<ClientInfo> for Client {
    fn from(info: ClientInfo) -> Self {
        Self {
            id: info.id,
            attributes: info.attributes,
            is_host: info.is_host,
            connect_time: info.connect_time.unwrap_or_else(now_millis),
        }
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
