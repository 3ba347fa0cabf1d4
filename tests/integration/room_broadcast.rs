// Test-specific lint overrides: integration tests use unwrap/expect freely,
// and some pedantic/nursery lints are not appropriate for test code.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::doc_markdown,
    clippy::future_not_send,
    clippy::missing_panics_doc,
    clippy::missing_docs_in_private_items
)]

//! End-to-end broadcast tests against a live in-process relay server.
//!
//! Real WebSocket clients (tokio-tungstenite) connect to a server bound on
//! an OS-assigned port and exchange the wire events of the chat protocol:
//! join announcements, verbatim chat fan-out without sender echo, typing
//! indicators, and the pre-join gate.

use std::net::SocketAddr;
use std::time::Duration;

use chatroom_proto::event::{ClientEvent, ServerEvent};
use chatroom_proto::message::ChatMessage;
use chatroom_relay::relay;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite;

type WsClient =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn start_test_server() -> SocketAddr {
    let (addr, _handle) = relay::start_server("127.0.0.1:0")
        .await
        .expect("failed to start test server");
    addr
}

async fn connect(addr: SocketAddr) -> WsClient {
    let url = format!("ws://{addr}/ws");
    let (ws, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
    ws
}

async fn send_event(ws: &mut WsClient, event: &ClientEvent) {
    let text = serde_json::to_string(event).unwrap();
    ws.send(tungstenite::Message::Text(text.into()))
        .await
        .unwrap();
}

/// Joins and then waits long enough for the server to have processed the
/// join, so later events from other connections observe this membership.
async fn join(ws: &mut WsClient, name: &str) {
    send_event(ws, &ClientEvent::Join(name.to_string())).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
}

async fn recv_event(ws: &mut WsClient) -> ServerEvent {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for event")
            .expect("connection closed")
            .expect("websocket error");
        if let tungstenite::Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// Asserts that no event arrives within a short window.
async fn assert_silent(ws: &mut WsClient) {
    match tokio::time::timeout(Duration::from_millis(250), ws.next()).await {
        Err(_) => {} // nothing delivered
        Ok(Some(Ok(tungstenite::Message::Text(text)))) => {
            panic!("expected silence, got event: {text}");
        }
        Ok(_) => {} // close/control frames are fine
    }
}

#[tokio::test]
async fn join_announces_to_existing_members() {
    let addr = start_test_server().await;

    let mut alice = connect(addr).await;
    join(&mut alice, "alice").await;

    let mut bob = connect(addr).await;
    join(&mut bob, "bob").await;

    // Pre-existing member alice hears about bob; bob gets no echo of his
    // own join.
    assert_eq!(recv_event(&mut alice).await, ServerEvent::News("bob".into()));
    assert_silent(&mut bob).await;
}

#[tokio::test]
async fn chat_message_delivered_verbatim_without_echo() {
    let addr = start_test_server().await;

    let mut alice = connect(addr).await;
    join(&mut alice, "alice").await;
    let mut bob = connect(addr).await;
    join(&mut bob, "bob").await;

    let _bob_joined = recv_event(&mut alice).await;

    let message = ChatMessage {
        id: "1".into(),
        sender: "alice".into(),
        message: "hi".into(),
        time: "10:00:00".into(),
    };
    send_event(&mut alice, &ClientEvent::Chat(message.clone())).await;

    // Bob receives the exact payload; the server rewrites nothing.
    assert_eq!(recv_event(&mut bob).await, ServerEvent::Chat(message));
    // Alice does not receive her own echo.
    assert_silent(&mut alice).await;
}

#[tokio::test]
async fn chat_fans_out_to_every_other_member() {
    let addr = start_test_server().await;

    let mut alice = connect(addr).await;
    join(&mut alice, "alice").await;
    let mut bob = connect(addr).await;
    join(&mut bob, "bob").await;
    let mut carol = connect(addr).await;
    join(&mut carol, "carol").await;

    // Drain the presence notices.
    let _ = recv_event(&mut alice).await;
    let _ = recv_event(&mut alice).await;
    let _ = recv_event(&mut bob).await;

    let message = ChatMessage {
        id: "2".into(),
        sender: "bob".into(),
        message: "hello all".into(),
        time: "10:01:00".into(),
    };
    send_event(&mut bob, &ClientEvent::Chat(message.clone())).await;

    assert_eq!(
        recv_event(&mut alice).await,
        ServerEvent::Chat(message.clone())
    );
    assert_eq!(recv_event(&mut carol).await, ServerEvent::Chat(message));
    assert_silent(&mut bob).await;
}

#[tokio::test]
async fn typing_indicators_reach_other_members_only() {
    let addr = start_test_server().await;

    let mut alice = connect(addr).await;
    join(&mut alice, "alice").await;
    let mut bob = connect(addr).await;
    join(&mut bob, "bob").await;

    let _bob_joined = recv_event(&mut alice).await;

    send_event(&mut alice, &ClientEvent::Typing("alice".into())).await;
    assert_eq!(recv_event(&mut bob).await, ServerEvent::Typing("alice".into()));

    send_event(&mut alice, &ClientEvent::StopTyping("alice".into())).await;
    assert_eq!(
        recv_event(&mut bob).await,
        ServerEvent::StopTyping("alice".into())
    );

    assert_silent(&mut alice).await;
}

#[tokio::test]
async fn events_before_join_are_not_relayed() {
    let addr = start_test_server().await;

    let mut bob = connect(addr).await;
    join(&mut bob, "bob").await;

    // This connection never joins.
    let mut lurker = connect(addr).await;
    send_event(&mut lurker, &ClientEvent::Typing("alice".into())).await;
    send_event(
        &mut lurker,
        &ClientEvent::Chat(ChatMessage {
            id: "3".into(),
            sender: "alice".into(),
            message: "anonymous blast".into(),
            time: "10:02:00".into(),
        }),
    )
    .await;

    // No broadcast reaches the joined member, and the lurker's connection
    // stays open: a join afterwards still works.
    assert_silent(&mut bob).await;

    join(&mut lurker, "alice").await;
    assert_eq!(recv_event(&mut bob).await, ServerEvent::News("alice".into()));
}
