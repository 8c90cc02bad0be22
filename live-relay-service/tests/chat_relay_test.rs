//! End-to-end tests for `WS /ws/chat` against a mock Live provider.

mod common;

use common::spawn_app;
use futures::{SinkExt, StreamExt};
use live_relay_service::services::{MockLiveProvider, MockRecorder};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn connect(provider: MockLiveProvider) -> (Client, MockRecorder) {
    let recorder = provider.recorder();
    let port = spawn_app(Arc::new(provider)).await;

    let (socket, _) = connect_async(format!("ws://127.0.0.1:{}/ws/chat", port))
        .await
        .expect("Failed to connect");

    (socket, recorder)
}

async fn send(socket: &mut Client, value: Value) {
    socket
        .send(Message::Text(value.to_string()))
        .await
        .expect("Failed to send frame");
}

async fn next_frame(socket: &mut Client) -> Option<Message> {
    tokio::time::timeout(Duration::from_secs(5), socket.next())
        .await
        .expect("timed out waiting for frame")
        .map(|m| m.expect("socket error"))
}

async fn next_json(socket: &mut Client) -> Value {
    match next_frame(socket).await {
        Some(Message::Text(text)) => serde_json::from_str(&text).unwrap(),
        other => panic!("expected text frame, got {:?}", other),
    }
}

/// Poll `check` until it holds or a few seconds pass.
async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}

#[tokio::test]
async fn text_turn_round_trip() {
    let (mut socket, recorder) = connect(MockLiveProvider::new()).await;

    send(&mut socket, json!({"type": "text", "message": "hello"})).await;

    assert_eq!(
        next_json(&mut socket).await,
        json!({"type": "text", "text": "Mock reply: hello"})
    );
    assert_eq!(next_json(&mut socket).await, json!({"type": "turn_complete"}));
    assert_eq!(recorder.turns(), vec!["hello".to_string()]);
}

#[tokio::test]
async fn turns_are_forwarded_in_receipt_order() {
    let (mut socket, recorder) = connect(MockLiveProvider::new()).await;

    send(&mut socket, json!({"type": "text", "message": "one"})).await;
    send(&mut socket, json!({"type": "text", "message": "two"})).await;

    let mut received = Vec::new();
    for _ in 0..4 {
        received.push(next_json(&mut socket).await);
    }

    assert_eq!(
        received,
        vec![
            json!({"type": "text", "text": "Mock reply: one"}),
            json!({"type": "turn_complete"}),
            json!({"type": "text", "text": "Mock reply: two"}),
            json!({"type": "turn_complete"}),
        ]
    );
    assert_eq!(recorder.turns(), vec!["one".to_string(), "two".to_string()]);
}

#[tokio::test]
async fn malformed_frame_is_ignored_and_connection_stays_open() {
    let (mut socket, recorder) = connect(MockLiveProvider::new()).await;

    send(&mut socket, json!({"foo": "bar"})).await;

    // Nothing comes back for the malformed frame.
    let silent = tokio::time::timeout(Duration::from_millis(200), socket.next()).await;
    assert!(silent.is_err(), "expected no frame, got {:?}", silent);
    assert!(recorder.turns().is_empty());

    // The connection is still usable.
    send(&mut socket, json!({"type": "text", "message": "ping"})).await;
    assert_eq!(
        next_json(&mut socket).await,
        json!({"type": "text", "text": "Mock reply: ping"})
    );
}

#[tokio::test]
async fn client_disconnect_closes_upstream_exactly_once() {
    let (mut socket, recorder) = connect(MockLiveProvider::new()).await;

    send(&mut socket, json!({"type": "text", "message": "bye"})).await;
    next_json(&mut socket).await;
    next_json(&mut socket).await;

    socket.close(None).await.expect("Failed to close");

    assert!(eventually(|| recorder.close_count() == 1).await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(recorder.close_count(), 1);
    assert_eq!(recorder.turns(), vec!["bye".to_string()]);
}

#[tokio::test]
async fn open_failure_sends_error_frame_then_closes() {
    let (mut socket, recorder) =
        connect(MockLiveProvider::new().with_open_failure("API key not valid")).await;

    let error = next_json(&mut socket).await;
    assert_eq!(error["type"], "error");
    assert!(error["error"].as_str().unwrap().contains("API key not valid"));

    match next_frame(&mut socket).await {
        Some(Message::Close(Some(frame))) => assert_eq!(u16::from(frame.code), 1011),
        other => panic!("expected close frame, got {:?}", other),
    }
    assert_eq!(recorder.sessions_opened(), 0);
}

#[tokio::test]
async fn connections_are_isolated() {
    let provider = MockLiveProvider::new().with_upstream_failure_on("crash");
    let recorder = provider.recorder();
    let port = spawn_app(Arc::new(provider)).await;
    let url = format!("ws://127.0.0.1:{}/ws/chat", port);

    let (mut failing, _) = connect_async(url.as_str()).await.unwrap();
    let (mut healthy, _) = connect_async(url.as_str()).await.unwrap();

    send(&mut failing, json!({"type": "text", "message": "crash"})).await;
    assert_eq!(next_json(&mut failing).await["type"], "error");

    send(&mut healthy, json!({"type": "text", "message": "fine"})).await;
    assert_eq!(
        next_json(&mut healthy).await,
        json!({"type": "text", "text": "Mock reply: fine"})
    );

    assert!(eventually(|| recorder.close_count() == 1).await);
}
