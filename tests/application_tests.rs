use msfcli::transport::{Frame, Outgoing};
use msfcli::{
    Application, ApplicationKind, Attributes, Channel, ChannelEvent, ChannelState, Error,
    MemoryConnector, MemoryPeer, ServiceEndpoint,
};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::test;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(2);

fn new_application(id: &str) -> (Application, mpsc::UnboundedReceiver<MemoryPeer>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let (connector, peers) = MemoryConnector::new();
    let builder =
        Channel::builder(ServiceEndpoint::parse("127.0.0.1").unwrap(), "com.example.game")
            .connector(connector);
    (Application::from_builder(id, builder).unwrap(), peers)
}

async fn next_message(peer: &mut MemoryPeer) -> Value {
    match timeout(WAIT, peer.recv()).await.expect("peer timed out") {
        Some(Outgoing::Frame(Frame::Text(text))) => serde_json::from_str(&text).unwrap(),
        other => panic!("Expected text frame, got {:?}", other),
    }
}

fn send_ack(peer: &MemoryPeer) {
    peer.send_event(
        "ms.channel.connect",
        json!({ "id": "A", "clients": [{ "id": "A" }, { "id": "TV", "isHost": true }] }),
    );
}

/// Launch and connect; returns the peer with the start call consumed
async fn launched(app: &Application, peers: &mut mpsc::UnboundedReceiver<MemoryPeer>) -> MemoryPeer {
    let task = {
        let app = app.clone();
        tokio::spawn(async move { app.connect(Attributes::new()).await })
    };
    let mut peer = peers.recv().await.unwrap();
    next_message(&mut peer).await;
    send_ack(&peer);
    peer.send_event("ms.channel.ready", json!(null));
    timeout(WAIT, task).await.unwrap().unwrap().unwrap();
    peer
}

/// Ids are classified as installed or web applications
#[test]
async fn test_application_kind() {
    let (app, _peers) = new_application("111299001912");
    assert_eq!(app.kind(), ApplicationKind::Installed);
    assert_eq!(app.id(), "111299001912");

    let (web, _peers) = new_application("https://example.com/game/");
    assert_eq!(web.kind(), ApplicationKind::Web);
}

/// Empty ids and channel uris are rejected
#[test]
async fn test_invalid_arguments() {
    let builder = Channel::builder(ServiceEndpoint::local(), "chat");
    assert!(matches!(
        Application::from_builder("", builder),
        Err(Error::InvalidArgument(_))
    ));

    let builder = Channel::builder(ServiceEndpoint::local(), "");
    assert!(matches!(
        Application::from_builder("111", builder),
        Err(Error::InvalidArgument(_))
    ));
}

/// The start call goes out as soon as the transport opens
#[test]
async fn test_start_call_on_open() {
    let (app, mut peers) = new_application("111299001912");
    let _task = {
        let app = app.clone();
        tokio::spawn(async move { app.connect(Attributes::new()).await })
    };

    let mut peer = peers.recv().await.unwrap();
    assert_eq!(
        next_message(&mut peer).await,
        json!({ "method": "ms.application.start", "params": { "id": "111299001912" } })
    );
}

/// Web applications are started by url
#[test]
async fn test_web_start_call() {
    let (app, mut peers) = new_application("http://example.com/game/");
    let _task = {
        let app = app.clone();
        tokio::spawn(async move { app.connect(Attributes::new()).await })
    };

    let mut peer = peers.recv().await.unwrap();
    assert_eq!(
        next_message(&mut peer).await,
        json!({
            "method": "ms.webapplication.start",
            "params": { "url": "http://example.com/game/" }
        })
    );
}

/// Connect completes only once the application reports ready
#[test]
async fn test_connect_waits_for_ready() {
    let (app, mut peers) = new_application("111299001912");
    let mut events = app.subscribe();
    let mut task = {
        let app = app.clone();
        tokio::spawn(async move { app.connect(Attributes::new()).await })
    };

    let mut peer = peers.recv().await.unwrap();
    next_message(&mut peer).await;
    send_ack(&peer);

    assert!(timeout(Duration::from_millis(100), &mut task).await.is_err());
    assert_eq!(app.channel().state().await, ChannelState::Connecting);

    peer.send_event("ms.channel.ready", json!(null));
    let me = timeout(WAIT, task).await.unwrap().unwrap().unwrap();
    assert_eq!(me.id(), "A");

    assert_eq!(events.recv().await.unwrap(), ChannelEvent::Ready);
    match events.recv().await.unwrap() {
        ChannelEvent::Connect(client) => assert_eq!(client.id(), "A"),
        other => panic!("Expected connect event, got {:?}", other),
    }
}

/// A ready event arriving before the acknowledgment is remembered
#[test]
async fn test_ready_before_ack() {
    let (app, mut peers) = new_application("111299001912");
    let task = {
        let app = app.clone();
        tokio::spawn(async move { app.connect(Attributes::new()).await })
    };

    let mut peer = peers.recv().await.unwrap();
    next_message(&mut peer).await;
    peer.send_event("ms.channel.ready", json!(null));
    send_ack(&peer);

    let me = timeout(WAIT, task).await.unwrap().unwrap().unwrap();
    assert_eq!(me.id(), "A");
    assert!(app.channel().is_connected().await);
}

/// Disconnecting with exit stops the remote application first
#[test]
async fn test_disconnect_with_exit() {
    let (app, mut peers) = new_application("111299001912");
    let mut peer = launched(&app, &mut peers).await;

    let task = {
        let app = app.clone();
        tokio::spawn(async move { app.disconnect(true).await })
    };

    let stop = next_message(&mut peer).await;
    assert_eq!(stop["method"], json!("ms.application.stop"));
    assert_eq!(stop["params"], json!({ "id": "111299001912" }));
    peer.send_json(&json!({ "id": stop["id"], "result": true }));

    assert_eq!(timeout(WAIT, peer.recv()).await.unwrap(), Some(Outgoing::Close));
    let me = timeout(WAIT, task).await.unwrap().unwrap().unwrap();
    assert_eq!(me.map(|c| c.id().to_string()), Some("A".to_string()));
}

/// A failed stop call still disconnects
#[test]
async fn test_disconnect_with_exit_error() {
    let (app, mut peers) = new_application("http://example.com/game/");
    let mut peer = launched(&app, &mut peers).await;

    let task = {
        let app = app.clone();
        tokio::spawn(async move { app.disconnect(true).await })
    };

    let stop = next_message(&mut peer).await;
    assert_eq!(stop["method"], json!("ms.webapplication.stop"));
    peer.send_json(&json!({ "id": stop["id"], "error": { "code": 404 } }));

    assert_eq!(timeout(WAIT, peer.recv()).await.unwrap(), Some(Outgoing::Close));
    assert!(timeout(WAIT, task).await.unwrap().unwrap().is_ok());
    assert!(!app.channel().is_connected().await);
}

/// Disconnecting without exit leaves the application running
#[test]
async fn test_disconnect_without_exit() {
    let (app, mut peers) = new_application("111299001912");
    let mut peer = launched(&app, &mut peers).await;

    app.disconnect(false).await.unwrap();
    assert_eq!(timeout(WAIT, peer.recv()).await.unwrap(), Some(Outgoing::Close));
}

/// An unanswered stop call is given up on
#[tokio::test(start_paused = true)]
async fn test_disconnect_stop_unanswered() {
    let (app, mut peers) = new_application("111299001912");
    let mut peer = launched(&app, &mut peers).await;

    let result = timeout(Duration::from_secs(60), app.disconnect(true)).await;
    assert!(result.unwrap().is_ok());
    assert!(!app.channel().is_connected().await);

    let stop = next_message(&mut peer).await;
    assert_eq!(stop["method"], json!("ms.application.stop"));
    assert_eq!(timeout(WAIT, peer.recv()).await.unwrap(), Some(Outgoing::Close));
}

/// Web applications cannot be installed
#[test]
async fn test_install_web_application() {
    let (app, _peers) = new_application("http://example.com/game/");
    assert!(matches!(app.install().await, Err(Error::NotSupported(_))));
}
