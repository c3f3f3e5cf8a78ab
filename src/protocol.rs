//! Wire-level message shapes exchanged over a channel connection.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Remote method used by [`Channel::publish`](crate::Channel::publish)
pub const METHOD_CHANNEL_EMIT: &str = "ms.channel.emit";

/// Starts an installed application
pub const METHOD_APPLICATION_START: &str = "ms.application.start";

/// Stops an installed application
pub const METHOD_APPLICATION_STOP: &str = "ms.application.stop";

/// Starts a web application
pub const METHOD_WEBAPPLICATION_START: &str = "ms.webapplication.start";

/// Stops a web application
pub const METHOD_WEBAPPLICATION_STOP: &str = "ms.webapplication.stop";

/// Connect acknowledgment carrying the assigned id and roster snapshot
pub const EVENT_CONNECT: &str = "ms.channel.connect";

/// A peer joined the channel
pub const EVENT_CLIENT_CONNECT: &str = "ms.channel.clientConnect";

/// A peer left the channel
pub const EVENT_CLIENT_DISCONNECT: &str = "ms.channel.clientDisconnect";

/// The remote application finished starting
pub const EVENT_READY: &str = "ms.channel.ready";

/// Health check event, reserved for the heartbeat monitor
pub const EVENT_HEARTBEAT: &str = "__ping";

/// Attributes a client attaches to itself when connecting
pub type Attributes = Map<String, Value>;

/// Recipient(s) of a published event
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Target {
    /// Every client except the sender
    #[default]
    Broadcast,

    /// Every client including the sender
    All,

    /// The host client only
    Host,

    /// A single client id
    Client(String),

    /// A list of client ids
    Clients(Vec<String>),
}

impl Target {
    pub(crate) fn validate(&self) -> Result<()> {
        match self {
            Self::Client(id) if id.is_empty() => Err(Error::InvalidArgument(
                "target client id must not be empty".to_string(),
            )),
            Self::Clients(ids) if ids.is_empty() => Err(Error::InvalidArgument(
                "target list must not be empty".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

impl Serialize for Target {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Broadcast => serializer.serialize_str("broadcast"),
            Self::All => serializer.serialize_str("all"),
            Self::Host => serializer.serialize_str("host"),
            Self::Client(id) => serializer.serialize_str(id),
            Self::Clients(ids) => ids.serialize(serializer),
        }
    }
}

impl From<&str> for Target {
    fn from(value: &str) -> Self {
        match value {
            "broadcast" => Self::Broadcast,
            "all" => Self::All,
            "host" => Self::Host,
            id => Self::Client(id.to_string()),
        }
    }
}

impl From<Vec<String>> for Target {
    fn from(ids: Vec<String>) -> Self {
        Self::Clients(ids)
    }
}

/// Outbound RPC call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Call {
    /// Remote method name
    pub method: String,

    /// Named parameters
    pub params: Value,

    /// Correlation id, absent for notifications
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

impl Call {
    /// Create a call without a correlation id
    pub fn notification(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
            id: None,
        }
    }

    /// Create the broadcast call used to publish an event
    pub fn emit(event: &str, data: Value, target: &Target) -> Self {
        Self::notification(
            METHOD_CHANNEL_EMIT,
            serde_json::json!({
                "event": event,
                "data": data,
                "to": target,
            }),
        )
    }
}

/// Peer description as pushed by the remote
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    /// Client id
    pub id: String,

    /// Attributes supplied at connect time
    #[serde(default)]
    pub attributes: Attributes,

    /// Host flag
    #[serde(default)]
    pub is_host: bool,

    /// Connect time in epoch milliseconds, when the remote provides it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_time: Option<u64>,
}

/// Data of the connect acknowledgment
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectAck {
    /// Id assigned to the local client
    pub id: String,

    /// Clients connected at acknowledgment time, including the local one
    #[serde(default)]
    pub clients: Vec<ClientInfo>,
}

/// Inbound RPC response
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Correlation id as sent by the remote
    pub id: Value,

    /// Result, when the call succeeded
    pub result: Option<Value>,

    /// Error, when the call failed
    pub error: Option<Value>,
}

impl Response {
    /// Numeric form of the correlation id
    pub fn call_id(&self) -> Option<u64> {
        match &self.id {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

/// Inbound event, lifecycle or user-defined
#[derive(Debug, Clone, PartialEq)]
pub struct EventMessage {
    /// Event name
    pub event: String,

    /// Event data
    pub data: Value,

    /// Originating client id
    pub from: Option<String>,

    /// Binary payload carried by a binary frame
    pub payload: Option<Vec<u8>>,
}

/// Classified inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Answer to an earlier call
    Response(Response),

    /// Broadcast or lifecycle event
    Event(EventMessage),

    /// Parsed JSON of no known shape
    Unrecognized(Value),
}

#[derive(Deserialize)]
struct RawMessage {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    from: Option<String>,
}

impl Inbound {
    /// Classify a decoded JSON message
    pub fn classify(value: Value, payload: Option<Vec<u8>>) -> Self {
        let raw: RawMessage = match serde_json::from_value(value.clone()) {
            Ok(raw) => raw,
            Err(_) => return Self::Unrecognized(value),
        };

        match raw {
            RawMessage {
                id: Some(id),
                result,
                error,
                ..
            } if result.is_some() || error.is_some() => Self::Response(Response { id, result, error }),
            RawMessage {
                event: Some(event),
                data,
                from,
                ..
            } if !event.is_empty() => Self::Event(EventMessage {
                event,
                data,
                from,
                payload,
            }),
            _ => Self::Unrecognized(value),
        }
    }
}
