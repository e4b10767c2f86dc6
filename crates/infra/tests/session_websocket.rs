//! Duplex session over a real WebSocket connection.
//!
//! **Coverage:**
//! - Inbound frames fan out to every subscriber
//! - Heartbeats reach the server at the configured payload
//! - A server-side close drops the session back to `Disconnected`
//! - Reconnect after the peer went away

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tidelink_core::{DuplexSession, ManualLinkProbe, MessageHandler, SessionSettings};
use tidelink_domain::{LinkQuality, SessionState};
use tidelink_infra::WebSocketTransport;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Accepts connections forever; echoes text frames as `echo:<text>` and
/// reports every frame it saw. A frame reading `bye` makes it close.
async fn echo_server() -> (String, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let seen = seen_tx.clone();
            tokio::spawn(async move {
                let Ok(mut ws) = accept_async(socket).await else { return };
                while let Some(Ok(message)) = ws.next().await {
                    if let Message::Text(text) = message {
                        let _ = seen.send(text.to_string());
                        if text == "bye" {
                            let _ = ws.close(None).await;
                            break;
                        }
                        if ws.send(Message::Text(format!("echo:{text}"))).await.is_err() {
                            break;
                        }
                    }
                }
            });
        }
    });

    (format!("ws://{addr}"), seen_rx)
}

fn settings(heartbeat_base: Duration) -> SessionSettings {
    SessionSettings {
        heartbeat_base,
        keepalive_payload: "ping".into(),
        handshake_timeout: Duration::from_secs(5),
        join_timeout: Duration::from_secs(2),
    }
}

fn session(url: String, heartbeat_base: Duration) -> DuplexSession {
    DuplexSession::new(
        Arc::new(WebSocketTransport::new(url)),
        Arc::new(ManualLinkProbe::new(LinkQuality::HighQuality)),
        settings(heartbeat_base),
    )
    .unwrap()
}

fn collector() -> (MessageHandler, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handler: MessageHandler = Arc::new(move |message: &str| {
        let _ = tx.send(message.to_string());
        Ok(())
    });
    (handler, rx)
}

async fn next(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a message")
        .expect("channel closed")
}

async fn wait_for_state(session: &DuplexSession, wanted: SessionState) {
    for _ in 0..100 {
        if session.state() == wanted {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("session never reached {wanted}, still {}", session.state());
}

#[tokio::test]
async fn inbound_messages_reach_every_subscriber() {
    let (url, _seen) = echo_server().await;
    let session = session(url, Duration::from_secs(3600));
    let (first, mut first_rx) = collector();
    let (second, mut second_rx) = collector();
    session.subscribe(first);
    session.subscribe(second);

    session.connect().await.unwrap();
    assert!(session.is_connected());
    session.send("hello").await;

    assert_eq!(next(&mut first_rx).await, "echo:hello");
    assert_eq!(next(&mut second_rx).await, "echo:hello");

    session.disconnect().await.unwrap();
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn heartbeats_carry_the_keepalive_payload() {
    let (url, mut seen) = echo_server().await;
    let session = session(url, Duration::from_millis(100));

    session.connect().await.unwrap();
    assert_eq!(next(&mut seen).await, "ping");
    assert_eq!(next(&mut seen).await, "ping");
    assert!(session.heartbeats_sent() >= 1);

    session.disconnect().await.unwrap();
}

#[tokio::test]
async fn server_close_disconnects_and_reconnect_works() {
    let (url, _seen) = echo_server().await;
    let session = session(url, Duration::from_secs(3600));
    let (handler, mut rx) = collector();
    session.subscribe(handler);

    session.connect().await.unwrap();
    session.send("bye").await;
    wait_for_state(&session, SessionState::Disconnected).await;

    session.connect().await.unwrap();
    session.send("again").await;
    assert_eq!(next(&mut rx).await, "echo:again");

    session.disconnect().await.unwrap();
}
