//! Multiscreen Channel Client Library
//!
//! This library connects applications to the screen service of a networked
//! device (such as a smart TV). It opens channels to applications running on
//! the device, exchanges events and RPC calls over them, and keeps track of
//! the clients connected to each channel.

pub mod application;
pub mod channel;
pub mod client;
pub mod client_list;
pub mod codec;
pub mod endpoint;
pub mod error;
pub mod heartbeat;
pub mod http;
pub mod protocol;
pub mod rpc;
pub mod search;
pub mod service;
pub mod transport;

pub use application::{Application, ApplicationKind};
pub use channel::{Channel, ChannelBuilder, ChannelConfig, ChannelEvent, ChannelSnapshot, ChannelState};
pub use client::Client;
pub use client_list::ClientList;
pub use endpoint::ServiceEndpoint;
pub use error::{Error, Result};
pub use protocol::{Attributes, Target};
pub use search::{Search, SearchConfig, SearchEvent};
pub use service::Service;
pub use transport::{Connector, MemoryConnector, MemoryPeer, WebSocketConnector};

/// Default port of the service API and plain channels
pub const DEFAULT_PORT: u16 = 8001;

/// Port of secure (`wss`) channels
pub const DEFAULT_SECURE_PORT: u16 = 8002;

/// Path of the service API
pub const API_PATH: &str = "/api/v2/";

/// Default connection timeout in seconds
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 10;

/// Timeout of application install requests in seconds
pub const INSTALL_TIMEOUT_SECS: u64 = 10;

/// Time allowed for the remote to answer an application stop in seconds
pub const STOP_TIMEOUT_SECS: u64 = 10;

/// Timeout of service description lookups in seconds
pub const SERVICE_TIMEOUT_SECS: u64 = 5;

/// Events buffered per channel subscriber
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// A simple example of using a channel:
///
/// ```rust,no_run
/// use msfcli::{Attributes, ChannelEvent, Service, Target};
/// use serde_json::json;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// // Look up the service
/// let service = Service::fetch("192.168.1.100").await?;
///
/// // Open a channel and listen for events
/// let channel = service.channel("com.example.chat")?;
/// let mut events = channel.subscribe();
///
/// let mut attributes = Attributes::new();
/// attributes.insert("name".into(), json!("Phone"));
/// let me = channel.connect(attributes).await?;
/// println!("connected as {}", me.id());
///
/// // Say hello to everyone else
/// channel.publish("say", json!("hello"), Target::Broadcast, None)?;
///
/// while let Ok(event) = events.recv().await {
///     if let ChannelEvent::Message { event, data, .. } = event {
///         println!("{}: {}", event, data);
///     }
/// }
///
/// // Disconnect when done
/// channel.disconnect().await?;
/// # Ok(())
/// # }
/// ```
#[doc(hidden)]
pub struct Examples;
