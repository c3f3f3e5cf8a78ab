use msfcli::transport::{Frame, Outgoing};
use msfcli::{Attributes, Channel, ChannelEvent, MemoryConnector, MemoryPeer, ServiceEndpoint};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout, Instant};

async fn connect_with_timeout(
    connection_timeout: Duration,
) -> (Channel, MemoryPeer, broadcast::Receiver<ChannelEvent>) {
    let (connector, mut peers) = MemoryConnector::new();
    let channel = Channel::builder(ServiceEndpoint::parse("127.0.0.1").unwrap(), "chat")
        .connector(connector)
        .connection_timeout(connection_timeout)
        .build()
        .unwrap();
    let mut events = channel.subscribe();

    let task = {
        let channel = channel.clone();
        tokio::spawn(async move { channel.connect(Attributes::new()).await })
    };
    let peer = peers.recv().await.unwrap();
    peer.send_event(
        "ms.channel.connect",
        json!({ "id": "A", "clients": [{ "id": "A" }, { "id": "B", "isHost": true }] }),
    );
    task.await.unwrap().unwrap();
    assert!(matches!(events.recv().await.unwrap(), ChannelEvent::Connect(_)));

    (channel, peer, events)
}

/// Echo every heartbeat back after a short delay; counts the echoes
fn spawn_echo(mut peer: MemoryPeer) -> Arc<AtomicUsize> {
    let echoes = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&echoes);
    tokio::spawn(async move {
        while let Some(outgoing) = peer.recv().await {
            let Outgoing::Frame(Frame::Text(text)) = outgoing else {
                continue;
            };
            let message: Value = serde_json::from_str(&text).unwrap();
            if message["params"]["event"] == json!("__ping") {
                assert_eq!(message["params"]["to"], json!("A"));
                sleep(Duration::from_millis(20)).await;
                peer.send_event("__ping", message["params"]["data"].clone());
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }
    });
    echoes
}

/// Without echoes the channel closes on the second tick
#[tokio::test(start_paused = true)]
async fn test_missing_echo_disconnects() {
    let (channel, mut peer, mut events) = connect_with_timeout(Duration::from_millis(1000)).await;
    let connected_at = Instant::now();

    let event = timeout(Duration::from_secs(10), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(event, ChannelEvent::Disconnect(Some(_))));

    let elapsed = connected_at.elapsed();
    assert!(elapsed >= Duration::from_millis(2000), "closed after {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(3000), "closed after {:?}", elapsed);
    assert!(!channel.is_connected().await);

    // One ping went out before the window expired
    let mut pings = 0;
    while let Some(outgoing) = peer.try_recv() {
        match outgoing {
            Outgoing::Frame(Frame::Text(text)) => {
                assert!(text.contains("__ping"));
                pings += 1;
            }
            Outgoing::Close => break,
            other => panic!("Unexpected {:?}", other),
        }
    }
    assert_eq!(pings, 1);
}

/// Echoed heartbeats keep the channel alive
#[tokio::test(start_paused = true)]
async fn test_echo_keeps_connection() {
    let (channel, peer, mut events) = connect_with_timeout(Duration::from_millis(1000)).await;
    let echoes = spawn_echo(peer);

    sleep(Duration::from_secs(10)).await;

    assert!(channel.is_connected().await);
    assert!(echoes.load(Ordering::SeqCst) >= 8);
    // Echoes are internal and never reach subscribers
    assert!(events.try_recv().is_err());
}

/// A zero timeout disables the check
#[tokio::test(start_paused = true)]
async fn test_disabled_heartbeat() {
    let (channel, mut peer, _events) = connect_with_timeout(Duration::ZERO).await;

    sleep(Duration::from_secs(30)).await;

    assert!(channel.is_connected().await);
    assert!(peer.try_recv().is_none());
}

/// Enabling the check while connected starts it right away
#[tokio::test(start_paused = true)]
async fn test_enable_while_connected() {
    let (channel, _peer, mut events) = connect_with_timeout(Duration::ZERO).await;
    let start = Instant::now();

    channel
        .set_connection_timeout(Duration::from_millis(500))
        .unwrap();
    assert_eq!(
        channel.connection_timeout().await,
        Duration::from_millis(500)
    );

    let event = timeout(Duration::from_secs(10), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(event, ChannelEvent::Disconnect(_)));
    assert!(start.elapsed() >= Duration::from_millis(1000));
    assert!(start.elapsed() < Duration::from_millis(1500));
}

/// Disabling the check while connected stops it
#[tokio::test(start_paused = true)]
async fn test_disable_while_connected() {
    let (channel, _peer, _events) = connect_with_timeout(Duration::from_millis(1000)).await;

    channel.set_connection_timeout(Duration::ZERO).unwrap();
    sleep(Duration::from_secs(10)).await;

    assert!(channel.is_connected().await);
    assert_eq!(channel.connection_timeout().await, Duration::ZERO);
}
