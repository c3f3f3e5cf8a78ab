//! Message transports beneath a channel.
//!
//! A [`Connector`] opens a connection and hands back a [`TransportHandle`]
//! right away. The handle is a pair of queues: the channel pushes
//! [`Outgoing`] items and receives [`TransportEvent`]s in delivery order.
//! Dropping the handle detaches the channel from that connection.

use crate::error::{Error, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, trace, warn};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

/// One discrete message on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 JSON text
    Text(String),

    /// Length-prefixed JSON followed by a payload
    Binary(Vec<u8>),
}

/// Something that happened on the connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is established
    Open,

    /// A frame arrived
    Frame(Frame),

    /// The connection failed; a `Closed` event follows
    Error(String),

    /// The connection is gone
    Closed,
}

/// Instruction for the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    /// Send a frame
    Frame(Frame),

    /// Close the connection
    Close,
}

/// The channel's end of one connection
#[derive(Debug)]
pub struct TransportHandle {
    outbound: mpsc::UnboundedSender<Outgoing>,
    inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

impl TransportHandle {
    /// Assemble a handle from its two queues
    pub fn new(
        outbound: mpsc::UnboundedSender<Outgoing>,
        inbound: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Self {
        Self { outbound, inbound }
    }

    /// Queue a frame for sending
    pub fn send(&self, frame: Frame) -> Result<()> {
        self.outbound
            .send(Outgoing::Frame(frame))
            .map_err(|_| Error::Connection("transport is closed".to_string()))
    }

    /// Ask the transport to close; events already queued are discarded with the handle
    pub fn close(self) {
        let _ = self.outbound.send(Outgoing::Close);
    }

    /// Next transport event; a vanished transport reads as `Closed`
    pub async fn recv(&mut self) -> TransportEvent {
        self.inbound.recv().await.unwrap_or(TransportEvent::Closed)
    }
}

/// Opens connections to a channel endpoint
#[async_trait]
pub trait Connector: Send + Sync + std::fmt::Debug {
    /// Start connecting to `url`
    async fn open(&self, url: Url) -> Result<TransportHandle>;
}

/// WebSocket connector built on `tokio-tungstenite`
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector {
    tls: Option<Arc<rustls::ClientConfig>>,
}

impl WebSocketConnector {
    /// Create a connector; `wss://` endpoints use the bundled web PKI roots
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific TLS configuration for `wss://` endpoints
    pub fn with_tls_config(config: Arc<rustls::ClientConfig>) -> Self {
        Self { tls: Some(config) }
    }

    fn tls_config(&self) -> Result<Arc<rustls::ClientConfig>> {
        if let Some(config) = &self.tls {
            return Ok(Arc::clone(config));
        }

        let roots = rustls::RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };
        let config = rustls::ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Connection(format!("TLS setup failed: {}", e)))?
        .with_root_certificates(roots)
        .with_no_client_auth();
        Ok(Arc::new(config))
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self, url: Url) -> Result<TransportHandle> {
        let tls = if url.scheme() == "wss" {
            Some(self.tls_config()?)
        } else {
            None
        };

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_websocket(url, tls, outbound_rx, inbound_tx));

        Ok(TransportHandle::new(outbound_tx, inbound_rx))
    }
}

async fn run_websocket(
    url: Url,
    tls: Option<Arc<rustls::ClientConfig>>,
    mut outbound: mpsc::UnboundedReceiver<Outgoing>,
    inbound: mpsc::UnboundedSender<TransportEvent>,
) {
    debug!("Connecting to {}", url);

    let connector = tls.map(tokio_tungstenite::Connector::Rustls);
    let connect =
        tokio_tungstenite::connect_async_tls_with_config(url.as_str(), None, false, connector);

    let ws = match connect.await {
        Ok((ws, _response)) => ws,
        Err(e) => {
            warn!("Failed to connect to {}: {}", url, e);
            let _ = inbound.send(TransportEvent::Error(Error::from(e).to_string()));
            let _ = inbound.send(TransportEvent::Closed);
            return;
        }
    };

    debug!("Connected to {}", url);
    if inbound.send(TransportEvent::Open).is_err() {
        return;
    }

    let (mut sink, mut stream) = ws.split();
    loop {
        tokio::select! {
            outgoing = outbound.recv() => match outgoing {
                Some(Outgoing::Frame(frame)) => {
                    let message = match frame {
                        Frame::Text(text) => Message::Text(text.into()),
                        Frame::Binary(bytes) => Message::Binary(bytes.into()),
                    };
                    if let Err(e) = sink.send(message).await {
                        error!("Failed to send frame: {}", e);
                        let _ = inbound.send(TransportEvent::Error(Error::from(e).to_string()));
                        break;
                    }
                }
                // Close requested, or the channel detached from this connection
                Some(Outgoing::Close) | None => {
                    if let Err(e) = sink.close().await {
                        trace!("Error closing websocket: {}", e);
                    }
                    break;
                }
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let _ = inbound.send(TransportEvent::Frame(Frame::Text(text.as_str().to_owned())));
                }
                Some(Ok(Message::Binary(bytes))) => {
                    let _ = inbound.send(TransportEvent::Frame(Frame::Binary(bytes.to_vec())));
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!("Connection closed by server");
                    break;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    warn!("Connection error: {}", e);
                    let _ = inbound.send(TransportEvent::Error(Error::from(e).to_string()));
                    break;
                }
            },
        }
    }

    let _ = inbound.send(TransportEvent::Closed);
    debug!("Websocket for {} stopped", url);
}

/// In-process connector; every opened connection surfaces as a [`MemoryPeer`]
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    peers: mpsc::UnboundedSender<MemoryPeer>,
}

impl MemoryConnector {
    /// Create a connector and the queue its peers arrive on
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MemoryPeer>) {
        let (peers, rx) = mpsc::unbounded_channel();
        (Self { peers }, rx)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn open(&self, url: Url) -> Result<TransportHandle> {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let _ = inbound_tx.send(TransportEvent::Open);
        let peer = MemoryPeer {
            url,
            inbound: inbound_tx,
            outbound: outbound_rx,
        };
        self.peers
            .send(peer)
            .map_err(|_| Error::Connection("memory listener is gone".to_string()))?;

        Ok(TransportHandle::new(outbound_tx, inbound_rx))
    }
}

/// Remote side of a [`MemoryConnector`] connection
#[derive(Debug)]
pub struct MemoryPeer {
    url: Url,
    inbound: mpsc::UnboundedSender<TransportEvent>,
    outbound: mpsc::UnboundedReceiver<Outgoing>,
}

impl MemoryPeer {
    /// URL the channel connected to
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Deliver a frame to the channel
    pub fn send_frame(&self, frame: Frame) -> bool {
        self.inbound.send(TransportEvent::Frame(frame)).is_ok()
    }

    /// Deliver a JSON text frame
    pub fn send_json<T: Serialize>(&self, message: &T) -> bool {
        match serde_json::to_string(message) {
            Ok(text) => self.send_frame(Frame::Text(text)),
            Err(_) => false,
        }
    }

    /// Deliver an event text frame
    pub fn send_event(&self, event: &str, data: serde_json::Value) -> bool {
        self.send_json(&serde_json::json!({ "event": event, "data": data }))
    }

    /// Report a transport failure followed by a close
    pub fn fail(&self, reason: &str) {
        let _ = self.inbound.send(TransportEvent::Error(reason.to_string()));
        let _ = self.inbound.send(TransportEvent::Closed);
    }

    /// Close the connection from the remote side
    pub fn close(&self) {
        let _ = self.inbound.send(TransportEvent::Closed);
    }

    /// Next item the channel sent; `None` once the channel dropped its handle
    pub async fn recv(&mut self) -> Option<Outgoing> {
        self.outbound.recv().await
    }

    /// Next sent item without waiting
    pub fn try_recv(&mut self) -> Option<Outgoing> {
        self.outbound.try_recv().ok()
    }
}
