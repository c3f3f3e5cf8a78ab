use crate::{
    client::{now_millis, Client},
    client_list::ClientList,
    codec,
    endpoint::ServiceEndpoint,
    error::{Error, Result},
    heartbeat::{Heartbeat, HeartbeatCheck},
    protocol::{
        Attributes, Call, ClientInfo, ConnectAck, EventMessage, Inbound, Target,
        EVENT_CLIENT_CONNECT, EVENT_CLIENT_DISCONNECT, EVENT_CONNECT, EVENT_HEARTBEAT,
        EVENT_READY,
    },
    rpc::PendingCalls,
    transport::{Connector, Frame, TransportEvent, TransportHandle, WebSocketConnector},
    DEFAULT_CONNECTION_TIMEOUT_SECS, DEFAULT_EVENT_CAPACITY,
};
use log::{debug, info, trace, warn};
use serde_json::Value;
use std::{fmt, sync::Arc, time::Duration};
use tokio::{
    sync::{broadcast, mpsc, oneshot},
    time::{self, Instant},
};

/// Channel configuration
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Service the channel lives on
    pub endpoint: ServiceEndpoint,

    /// Channel URI on the service (e.g. `com.example.chat`)
    pub uri: String,

    /// Connect over `wss` to the secure port
    pub secure: bool,

    /// Heartbeat timeout; zero disables the health check
    pub connection_timeout: Duration,

    /// How long `connect` waits for the remote acknowledgment
    pub connect_timeout: Duration,

    /// Events buffered per subscriber before the slowest one lags
    pub event_capacity: usize,
}

impl ChannelConfig {
    /// Configuration with defaults for the given channel
    pub fn new(endpoint: ServiceEndpoint, uri: impl Into<String>) -> Self {
        Self {
            endpoint,
            uri: uri.into(),
            secure: false,
            connection_timeout: Duration::ZERO,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECTION_TIMEOUT_SECS),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// Builder for creating a channel
#[derive(Debug)]
pub struct ChannelBuilder {
    /// Channel configuration
    config: ChannelConfig,

    /// Transport factory
    connector: Arc<dyn Connector>,

    /// Call sent as soon as the transport opens
    start_call: Option<Call>,

    /// Hold the connected transition until the remote reports ready
    connect_on_ready: bool,
}

impl ChannelBuilder {
    /// Create a new channel builder
    pub fn new(endpoint: ServiceEndpoint, uri: impl Into<String>) -> Self {
        Self {
            config: ChannelConfig::new(endpoint, uri),
            connector: Arc::new(WebSocketConnector::new()),
            start_call: None,
            connect_on_ready: false,
        }
    }

    /// Enable or disable secure (`wss`) connections
    pub fn secure(mut self, enable: bool) -> Self {
        self.config.secure = enable;
        self
    }

    /// Set the heartbeat timeout; zero disables the health check
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_timeout = timeout;
        self
    }

    /// Set how long `connect` waits for the acknowledgment
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the per-subscriber event buffer
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity.max(1);
        self
    }

    /// Use a custom transport
    pub fn connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Arc::new(connector);
        self
    }

    pub(crate) fn start_call(mut self, call: Call) -> Self {
        self.start_call = Some(call);
        self
    }

    pub(crate) fn connect_on_ready(mut self, enable: bool) -> Self {
        self.connect_on_ready = enable;
        self
    }

    pub(crate) fn uri(&self) -> &str {
        &self.config.uri
    }

    pub(crate) fn endpoint(&self) -> &ServiceEndpoint {
        &self.config.endpoint
    }

    /// Build the channel and start its task on the current Tokio runtime
    pub fn build(self) -> Result<Channel> {
        if self.config.uri.is_empty() {
            return Err(Error::InvalidArgument(
                "channel uri must not be empty".to_string(),
            ));
        }

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(self.config.event_capacity);

        let actor = ChannelActor {
            uri: self.config.uri.clone(),
            endpoint: self.config.endpoint.clone(),
            secure: self.config.secure,
            connector: self.connector,
            state: ChannelState::Disconnected,
            client_id: None,
            clients: ClientList::new(),
            calls: PendingCalls::new(),
            heartbeat: Heartbeat::new(self.config.connection_timeout),
            transport: None,
            connect_reply: None,
            start_call: self.start_call,
            connect_on_ready: self.connect_on_ready,
            ready_seen: false,
            events: events.clone(),
            commands: commands_rx,
        };
        tokio::spawn(actor.run());

        Ok(Channel {
            uri: Arc::from(self.config.uri.as_str()),
            connect_timeout: self.config.connect_timeout,
            commands: commands_tx,
            events,
        })
    }
}

/// Channel state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// No acknowledged connection
    Disconnected,

    /// Transport opening or waiting for the remote acknowledgment
    Connecting,

    /// Acknowledged by the remote
    Connected,
}

/// Notification delivered to channel subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// The channel connected; carries the local client
    Connect(Client),

    /// The channel disconnected; carries the local client as it was
    Disconnect(Option<Client>),

    /// A peer joined
    ClientConnect(Client),

    /// A peer left
    ClientDisconnect(Client),

    /// The remote application is ready
    Ready,

    /// The transport failed
    Error(String),

    /// An application-defined event
    Message {
        /// Event name
        event: String,
        /// Event data
        data: Value,
        /// Sender, when it is in the roster
        from: Option<Client>,
        /// Binary payload sent with the event
        payload: Option<Vec<u8>>,
    },
}

/// Point-in-time view of a channel
#[derive(Debug, Clone)]
pub struct ChannelSnapshot {
    /// Connection state
    pub state: ChannelState,

    /// Id assigned by the remote on connect
    pub client_id: Option<String>,

    /// Connected clients
    pub clients: ClientList,

    /// Heartbeat timeout, zero when disabled
    pub connection_timeout: Duration,

    /// Whether secure mode is selected
    pub secure: bool,

    /// Calls still awaiting a response
    pub pending_calls: usize,
}

impl ChannelSnapshot {
    /// The local client
    pub fn me(&self) -> Option<&Client> {
        self.clients.me(self.client_id.as_deref())
    }
}

enum Command {
    Connect {
        attributes: Attributes,
        reply: oneshot::Sender<Result<Client>>,
    },
    Disconnect {
        reply: oneshot::Sender<Option<Client>>,
    },
    Publish {
        event: String,
        data: Value,
        target: Target,
        payload: Option<Vec<u8>>,
    },
    Invoke {
        call: Call,
        payload: Option<Vec<u8>>,
        reply: Option<oneshot::Sender<Result<Value>>>,
    },
    SetConnectionTimeout(Duration),
    SetSecurityMode(bool),
    Snapshot {
        reply: oneshot::Sender<ChannelSnapshot>,
    },
}

/// A logical duplex channel to the clients of a screen service.
///
/// `Channel` is a cheap handle; clones share the same connection. All state
/// lives in a task that processes commands and transport events one at a
/// time. The task stops, closing any transport, once every handle is
/// dropped.
#[derive(Clone)]
pub struct Channel {
    uri: Arc<str>,
    connect_timeout: Duration,
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<ChannelEvent>,
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel").field("uri", &self.uri).finish()
    }
}

impl Channel {
    /// Create a new channel builder
    pub fn builder(endpoint: ServiceEndpoint, uri: impl Into<String>) -> ChannelBuilder {
        ChannelBuilder::new(endpoint, uri)
    }

    /// The channel URI
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Subscribe to channel events
    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.events.subscribe()
    }

    /// Connect and wait for the remote acknowledgment.
    ///
    /// Resolves with the local client. Fails with
    /// [`Error::AlreadyConnected`] when a connection is live; no second
    /// transport is opened in that case.
    pub async fn connect(&self, attributes: Attributes) -> Result<Client> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Connect { attributes, reply })?;

        match time::timeout(self.connect_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ChannelClosed),
            Err(_) => {
                let _ = self.disconnect().await;
                Err(Error::Timeout(format!(
                    "Connection timeout after {} seconds",
                    self.connect_timeout.as_secs_f32()
                )))
            }
        }
    }

    /// Close the connection.
    ///
    /// The local transition happens right away even if the transport is
    /// still closing. Resolves with the local client as it was while
    /// connected.
    pub async fn disconnect(&self) -> Result<Option<Client>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Disconnect { reply })?;
        rx.await.map_err(|_| Error::ChannelClosed)
    }

    /// Publish an event to other clients.
    ///
    /// Arguments are validated immediately. While disconnected the event
    /// is dropped with a warning.
    pub fn publish(
        &self,
        event: &str,
        data: Value,
        target: impl Into<Target>,
        payload: Option<Vec<u8>>,
    ) -> Result<()> {
        if event.is_empty() {
            return Err(Error::InvalidArgument(
                "event must be a valid string".to_string(),
            ));
        }
        if event == EVENT_HEARTBEAT {
            return Err(Error::InvalidArgument(format!(
                "event name {} is reserved",
                EVENT_HEARTBEAT
            )));
        }
        let target = target.into();
        target.validate()?;

        self.send(Command::Publish {
            event: event.to_string(),
            data,
            target,
            payload,
        })
    }

    /// Call a remote method and wait for its response.
    ///
    /// The call stays pending until the remote answers; disconnecting does
    /// not resolve it. Wrap in [`tokio::time::timeout`] to bound the wait.
    pub async fn invoke(
        &self,
        method: &str,
        params: Value,
        payload: Option<Vec<u8>>,
    ) -> Result<Value> {
        let call = Call::notification(method, normalize_params(method, params)?);
        let (reply, rx) = oneshot::channel();
        self.send(Command::Invoke {
            call,
            payload,
            reply: Some(reply),
        })?;
        rx.await.map_err(|_| Error::ChannelClosed)?
    }

    /// Send a remote method call without waiting for a response
    pub fn notify(&self, method: &str, params: Value, payload: Option<Vec<u8>>) -> Result<()> {
        let call = Call::notification(method, normalize_params(method, params)?);
        self.send(Command::Invoke {
            call,
            payload,
            reply: None,
        })
    }

    /// Set the heartbeat timeout. Zero stops the health check; a new value
    /// restarts it immediately while connected.
    pub fn set_connection_timeout(&self, timeout: Duration) -> Result<()> {
        self.send(Command::SetConnectionTimeout(timeout))
    }

    /// Select secure (`wss`) or plain endpoints for the next connect
    pub fn set_security_mode(&self, secure: bool) -> Result<()> {
        self.send(Command::SetSecurityMode(secure))
    }

    /// Current view of the channel
    pub async fn snapshot(&self) -> Result<ChannelSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot { reply })?;
        rx.await.map_err(|_| Error::ChannelClosed)
    }

    /// Get the current channel state
    pub async fn state(&self) -> ChannelState {
        self.snapshot()
            .await
            .map(|s| s.state)
            .unwrap_or(ChannelState::Disconnected)
    }

    /// Check if the channel is connected
    pub async fn is_connected(&self) -> bool {
        self.state().await == ChannelState::Connected
    }

    /// Clients currently connected
    pub async fn clients(&self) -> ClientList {
        self.snapshot()
            .await
            .map(|s| s.clients)
            .unwrap_or_default()
    }

    /// The local client while connected
    pub async fn me(&self) -> Option<Client> {
        self.snapshot().await.ok().and_then(|s| s.me().cloned())
    }

    /// Heartbeat timeout, zero when disabled
    pub async fn connection_timeout(&self) -> Duration {
        self.snapshot()
            .await
            .map(|s| s.connection_timeout)
            .unwrap_or_default()
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(|_| Error::ChannelClosed)
    }
}

fn normalize_params(method: &str, params: Value) -> Result<Value> {
    if method.is_empty() {
        return Err(Error::InvalidArgument(
            "method must be a valid string".to_string(),
        ));
    }
    match params {
        Value::Null => Ok(Value::Object(Default::default())),
        Value::Object(_) => Ok(params),
        _ => Err(Error::InvalidArgument(
            "params must be an object".to_string(),
        )),
    }
}

/// Owner of all channel state
struct ChannelActor {
    uri: String,
    endpoint: ServiceEndpoint,
    secure: bool,
    connector: Arc<dyn Connector>,
    state: ChannelState,
    client_id: Option<String>,
    clients: ClientList,
    calls: PendingCalls,
    heartbeat: Heartbeat,
    transport: Option<TransportHandle>,
    connect_reply: Option<oneshot::Sender<Result<Client>>>,
    start_call: Option<Call>,
    connect_on_ready: bool,
    ready_seen: bool,
    events: broadcast::Sender<ChannelEvent>,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl ChannelActor {
    async fn run(mut self) {
        debug!("Starting channel task for {}", self.uri);

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                event = next_transport_event(&mut self.transport) => {
                    self.handle_transport_event(event);
                }
                _ = self.heartbeat.tick() => self.check_heartbeat(),
            }
        }

        if let Some(transport) = self.transport.take() {
            transport.close();
        }
        debug!("Channel task for {} stopped", self.uri);
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { attributes, reply } => self.connect(attributes, reply).await,
            Command::Disconnect { reply } => {
                if self.state != ChannelState::Connected {
                    warn!("channel {} is already disconnected", self.uri);
                }
                self.close_transport();
                let _ = reply.send(self.handle_close());
            }
            Command::Publish {
                event,
                data,
                target,
                payload,
            } => {
                if self.state != ChannelState::Connected {
                    warn!("channel {} is not connected, dropping event {}", self.uri, event);
                    return;
                }
                let call = Call::emit(&event, data, &target);
                if let Err(e) = self.send_call(&call, payload.as_deref()) {
                    warn!("Failed to publish {}: {}", event, e);
                }
            }
            Command::Invoke {
                call,
                payload,
                reply,
            } => self.invoke(call, payload, reply),
            Command::SetConnectionTimeout(timeout) => {
                self.heartbeat.set_timeout(timeout);
                if self.state == ChannelState::Connected {
                    self.heartbeat.start();
                }
            }
            Command::SetSecurityMode(secure) => self.secure = secure,
            Command::Snapshot { reply } => {
                let _ = reply.send(ChannelSnapshot {
                    state: self.state,
                    client_id: self.client_id.clone(),
                    clients: self.clients.clone(),
                    connection_timeout: self.heartbeat.timeout(),
                    secure: self.secure,
                    pending_calls: self.calls.len(),
                });
            }
        }
    }

    async fn connect(&mut self, attributes: Attributes, reply: oneshot::Sender<Result<Client>>) {
        if self.state == ChannelState::Connected {
            warn!("Channel {} is already connected", self.uri);
            let _ = reply.send(Err(Error::AlreadyConnected));
            return;
        }

        let url = match self
            .endpoint
            .channel_url(&self.uri, self.secure, &attributes)
        {
            Ok(url) => url,
            Err(e) => {
                let _ = reply.send(Err(e));
                return;
            }
        };

        if let Some(previous) = self.transport.take() {
            debug!("Detaching previous transport for {}", self.uri);
            previous.close();
        }
        if let Some(previous) = self.connect_reply.take() {
            let _ = previous.send(Err(Error::Connection(
                "superseded by a newer connect".to_string(),
            )));
        }
        self.clients.clear();
        self.client_id = None;
        self.ready_seen = false;

        debug!("Connecting channel {} at {}", self.uri, url);
        match self.connector.open(url).await {
            Ok(transport) => {
                self.transport = Some(transport);
                self.state = ChannelState::Connecting;
                self.connect_reply = Some(reply);
            }
            Err(e) => {
                self.state = ChannelState::Disconnected;
                let _ = reply.send(Err(e));
            }
        }
    }

    fn invoke(
        &mut self,
        mut call: Call,
        payload: Option<Vec<u8>>,
        reply: Option<oneshot::Sender<Result<Value>>>,
    ) {
        if self.transport.is_none() {
            if let Some(reply) = reply {
                let _ = reply.send(Err(Error::NotConnected));
            }
            return;
        }

        if reply.is_some() {
            call.id = Some(self.calls.next_id());
        }

        match (self.send_call(&call, payload.as_deref()), reply, call.id) {
            (Ok(()), Some(reply), Some(id)) => self.calls.insert(id, reply),
            (Err(e), Some(reply), _) => {
                let _ = reply.send(Err(e));
            }
            (Err(e), None, _) => warn!("Failed to send {}: {}", call.method, e),
            _ => {}
        }
    }

    fn send_call(&self, call: &Call, payload: Option<&[u8]>) -> Result<()> {
        let transport = self.transport.as_ref().ok_or(Error::NotConnected)?;
        let frame = codec::encode_frame(call, payload)?;
        trace!("Sending {} on {}", call.method, self.uri);
        transport.send(frame)
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Open => {
                debug!("Transport open for {}", self.uri);
                if let Some(call) = self.start_call.clone() {
                    if let Err(e) = self.send_call(&call, None) {
                        warn!("Failed to send {}: {}", call.method, e);
                    }
                }
            }
            TransportEvent::Frame(frame) => self.handle_frame(frame),
            TransportEvent::Error(reason) => {
                warn!("Transport error on {}: {}", self.uri, reason);
                self.emit(ChannelEvent::Error(reason));
            }
            TransportEvent::Closed => {
                debug!("Transport closed for {}", self.uri);
                self.transport = None;
                self.handle_close();
            }
        }
    }

    fn handle_frame(&mut self, frame: Frame) {
        let message = match codec::decode_frame(frame) {
            Ok(message) => message,
            Err(e) => {
                warn!("unable to parse message: {}", e);
                return;
            }
        };

        match message {
            Inbound::Response(response) => {
                self.calls.resolve(response);
            }
            Inbound::Event(event) => self.handle_event(event),
            Inbound::Unrecognized(value) => warn!("unrecognized message type: {}", value),
        }
    }

    fn handle_event(&mut self, message: EventMessage) {
        match message.event.as_str() {
            EVENT_CONNECT => match serde_json::from_value::<ConnectAck>(message.data) {
                Ok(ack) => self.on_connect_ack(ack),
                Err(e) => warn!("malformed connect acknowledgment: {}", e),
            },
            EVENT_CLIENT_CONNECT => match serde_json::from_value::<ClientInfo>(message.data) {
                Ok(info) => {
                    let client = Client::from(info);
                    debug!("client {} connected to {}", client.id(), self.uri);
                    self.clients.push(client.clone());
                    self.emit(ChannelEvent::ClientConnect(client));
                }
                Err(e) => warn!("malformed clientConnect: {}", e),
            },
            EVENT_CLIENT_DISCONNECT => match serde_json::from_value::<ClientInfo>(message.data) {
                Ok(info) => self.on_client_disconnect(info),
                Err(e) => warn!("malformed clientDisconnect: {}", e),
            },
            EVENT_READY => self.on_ready(),
            EVENT_HEARTBEAT => {
                let now = Instant::now();
                self.heartbeat.record_echo(now);
                if let Some(sent) = message.data.as_u64() {
                    debug!("ping trip: {}ms", now_millis().saturating_sub(sent));
                }
            }
            _ => {
                let from = message
                    .from
                    .as_deref()
                    .and_then(|id| self.clients.get_by_id(id))
                    .cloned();
                trace!("dispatching event {} on {}", message.event, self.uri);
                self.emit(ChannelEvent::Message {
                    event: message.event,
                    data: message.data,
                    from,
                    payload: message.payload,
                });
            }
        }
    }

    fn on_connect_ack(&mut self, ack: ConnectAck) {
        self.client_id = Some(ack.id);
        self.clients.clear();
        for info in ack.clients {
            self.clients.push(Client::from(info));
        }

        if self.connect_on_ready && !self.ready_seen {
            debug!("channel {} acknowledged, waiting for ready", self.uri);
            return;
        }
        self.mark_connected();
    }

    fn on_ready(&mut self) {
        self.emit(ChannelEvent::Ready);
        self.ready_seen = true;

        if self.connect_on_ready
            && self.state == ChannelState::Connecting
            && self.client_id.is_some()
        {
            self.mark_connected();
        }
    }

    fn mark_connected(&mut self) {
        let me = match self.clients.me(self.client_id.as_deref()) {
            Some(me) => me.clone(),
            None => {
                let id = self.client_id.clone().unwrap_or_default();
                warn!("own client {} is missing from the roster", id);
                let me = Client::new(id, Attributes::new(), false);
                self.clients.push(me.clone());
                me
            }
        };

        self.state = ChannelState::Connected;
        info!("Channel {} connected as {}", self.uri, me.id());

        if let Some(reply) = self.connect_reply.take() {
            let _ = reply.send(Ok(me.clone()));
        }
        self.heartbeat.start();
        self.emit(ChannelEvent::Connect(me));
    }

    fn on_client_disconnect(&mut self, info: ClientInfo) {
        let client = match self.clients.remove(&info.id) {
            Some(client) => client,
            None => {
                warn!(
                    "client {} could not be found, so it was not removed from the client list",
                    info.id
                );
                Client::from(info)
            }
        };

        debug!("client {} disconnected from {}", client.id(), self.uri);
        let is_host = client.is_host();
        self.emit(ChannelEvent::ClientDisconnect(client));

        if is_host && self.transport.is_some() {
            info!("Host left channel {}, disconnecting", self.uri);
            self.close_transport();
            self.handle_close();
        }
    }

    fn check_heartbeat(&mut self) {
        match self.heartbeat.check(Instant::now()) {
            HeartbeatCheck::Alive => {
                let Some(id) = self.client_id.clone() else {
                    return;
                };
                trace!("sending ping on {}", self.uri);
                let call = Call::emit(
                    EVENT_HEARTBEAT,
                    Value::from(now_millis()),
                    &Target::Client(id),
                );
                if let Err(e) = self.send_call(&call, None) {
                    warn!("Failed to send ping: {}", e);
                }
            }
            HeartbeatCheck::Expired => {
                warn!("ping timed out, closing channel {}", self.uri);
                self.heartbeat.stop();
                self.close_transport();
                self.handle_close();
            }
        }
    }

    fn close_transport(&mut self) {
        if let Some(transport) = self.transport.take() {
            transport.close();
        }
    }

    /// Local disconnected transition; returns the local client as it was
    fn handle_close(&mut self) -> Option<Client> {
        let me = self.clients.me(self.client_id.as_deref()).cloned();
        let was_connected = self.state == ChannelState::Connected;

        self.heartbeat.stop();
        self.clients.clear();
        self.client_id = None;
        self.ready_seen = false;
        self.state = ChannelState::Disconnected;

        if let Some(reply) = self.connect_reply.take() {
            let _ = reply.send(Err(Error::Connection(
                "connection closed before the channel was acknowledged".to_string(),
            )));
        }

        if was_connected {
            info!("Channel {} disconnected", self.uri);
            self.emit(ChannelEvent::Disconnect(me.clone()));
            me
        } else {
            None
        }
    }

    fn emit(&self, event: ChannelEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

async fn next_transport_event(transport: &mut Option<TransportHandle>) -> TransportEvent {
    match transport {
        Some(transport) => transport.recv().await,
        None => std::future::pending().await,
    }
}
