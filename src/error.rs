use std::io;
use thiserror::Error;

/// Result type for channel client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the channel client
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    IO(#[from] io::Error),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// The channel already holds an acknowledged connection
    #[error("Channel is already connected")]
    AlreadyConnected,

    /// The channel has no live transport
    #[error("Channel is not connected")]
    NotConnected,

    /// Argument rejected before any I/O happened
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// JSON header does not fit in the 2-byte length prefix
    #[error("Message too large: {0} bytes exceeds the 65535 byte header limit")]
    MessageTooLarge(usize),

    /// Malformed inbound frame
    #[error("Decode error: {0}")]
    Decode(String),

    /// The remote answered an RPC call with an error value
    #[error("Remote error: {0}")]
    Rpc(serde_json::Value),

    /// Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Operation not available for this target
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// Non-success HTTP status
    #[error("HTTP error {status}: {message}")]
    Http {
        /// Status code returned by the service
        status: u16,
        /// Reason phrase
        message: String,
    },

    /// Websocket protocol error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The channel task has stopped
    #[error("Channel task has stopped")]
    ChannelClosed,

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<String> for Error {
    fn from(err: String) -> Self {
        Self::Other(err)
    }
}

impl From<&str> for Error {
    fn from(err: &str) -> Self {
        Self::Other(err.to_string())
    }
}
