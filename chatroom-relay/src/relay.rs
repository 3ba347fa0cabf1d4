//! Relay server core: shared state, WebSocket handler, and event fan-out.
//!
//! The relay accepts WebSocket connections, assigns each a connection id,
//! and routes chat room events between members of the single shared room.
//! Messages are never stored: the relay is a pure pass-through with
//! best-effort delivery while both ends are connected.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::http::HeaderValue;
use chatroom_proto::DEFAULT_ROOM;
use chatroom_proto::event::{self, ClientEvent, ServerEvent};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{RwLock, mpsc};
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::rooms::RoomRegistry;

/// Static greeting served on the liveness endpoint.
const LIVENESS_GREETING: &str = "Hello! PING ME.";

/// Shared relay server state holding the connection registry and room map.
pub struct RelayState {
    /// Maps connection id to a channel sender feeding that connection's
    /// WebSocket writer task.
    connections: RwLock<HashMap<Uuid, mpsc::UnboundedSender<Message>>>,
    /// Authoritative room membership.
    pub rooms: RoomRegistry,
}

impl Default for RelayState {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayState {
    /// Creates a new relay state with no connections and no room members.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            rooms: RoomRegistry::new(),
        }
    }

    /// Registers a connection, storing the sender half of its write channel.
    pub async fn register(&self, conn_id: Uuid, sender: mpsc::UnboundedSender<Message>) {
        let mut conns = self.connections.write().await;
        conns.insert(conn_id, sender);
    }

    /// Removes a connection from the registry, returning the sender if it
    /// existed. Dropping the sender closes the write channel, which ends
    /// the connection's writer task.
    pub async fn unregister(&self, conn_id: Uuid) -> Option<mpsc::UnboundedSender<Message>> {
        let mut conns = self.connections.write().await;
        conns.remove(&conn_id)
    }

    /// Returns a clone of the sender for the given connection, if registered.
    pub async fn get_sender(&self, conn_id: Uuid) -> Option<mpsc::UnboundedSender<Message>> {
        let conns = self.connections.read().await;
        conns.get(&conn_id).cloned()
    }
}

/// Handles an upgraded WebSocket connection for its entire lifetime.
///
/// The connection lifecycle:
/// 1. Assign a fresh connection id and register the write channel.
/// 2. Spawn a writer task draining the channel into the socket.
/// 3. Read frames, dispatching each decoded event.
/// 4. On reader or writer exit, run the teardown path exactly once.
///
/// A client may sit connected without joining; until it sends
/// `joinChatRoom`, everything except join is dropped.
pub async fn handle_socket(socket: WebSocket, state: Arc<RelayState>) {
    let conn_id = Uuid::now_v7();
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    state.register(conn_id, tx).await;
    tracing::info!(conn_id = %conn_id, "client connected");

    // Writer task: forwards queued messages to the socket. A failed sink
    // write ends the task, which the select below turns into teardown.
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                tracing::warn!(conn_id = %conn_id, "WebSocket write failed");
                break;
            }
        }
    });

    // Reader task: dispatch incoming frames from this client.
    let reader_state = Arc::clone(&state);
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Text(text) => {
                    handle_event(conn_id, text.as_str(), &reader_state).await;
                }
                Message::Close(_) => {
                    tracing::info!(conn_id = %conn_id, "received close frame");
                    break;
                }
                _ => {
                    // Ignore binary, ping, pong frames.
                }
            }
        }
    });

    // Wait for either task to finish, then abort the other.
    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
        }
        _ = &mut write_task => {
            read_task.abort();
        }
    }

    disconnect(&state, conn_id).await;
    tracing::info!(conn_id = %conn_id, "client disconnected");
}

/// Dispatches one decoded event from a connection.
///
/// Events other than join from a connection that has not joined are dropped
/// silently; the connection stays open and un-joined.
async fn handle_event(conn_id: Uuid, text: &str, state: &Arc<RelayState>) {
    let client_event = match event::decode(text) {
        Ok(ev) => ev,
        Err(e) => {
            tracing::warn!(conn_id = %conn_id, error = %e, "dropping undecodable frame");
            return;
        }
    };

    match client_event {
        ClientEvent::Join(name) => {
            let previous = state.rooms.join(DEFAULT_ROOM, conn_id, &name).await;
            if previous.is_some() {
                tracing::debug!(conn_id = %conn_id, name = %name, "duplicate join, re-announcing");
            } else {
                tracing::info!(conn_id = %conn_id, name = %name, room = DEFAULT_ROOM, "member joined room");
            }
            broadcast(state, conn_id, &ServerEvent::News(name)).await;
        }
        ClientEvent::Chat(message) => {
            if !is_joined(state, conn_id).await {
                return;
            }
            // Pure pass-through: id, sender, and time are relayed verbatim.
            broadcast(state, conn_id, &ServerEvent::Chat(message)).await;
        }
        ClientEvent::Typing(name) => {
            if !is_joined(state, conn_id).await {
                return;
            }
            broadcast(state, conn_id, &ServerEvent::Typing(name)).await;
        }
        ClientEvent::StopTyping(name) => {
            if !is_joined(state, conn_id).await {
                return;
            }
            broadcast(state, conn_id, &ServerEvent::StopTyping(name)).await;
        }
        ClientEvent::Leave(_) => {
            // Shares the teardown path with transport close; the announced
            // name is the registry-stored one, not the event payload.
            leave_room(state, conn_id).await;
        }
    }
}

/// Returns whether the connection has joined the room, logging the drop
/// when it has not.
async fn is_joined(state: &Arc<RelayState>, conn_id: Uuid) -> bool {
    if state.rooms.display_name(DEFAULT_ROOM, conn_id).await.is_some() {
        true
    } else {
        tracing::debug!(conn_id = %conn_id, "dropping event from un-joined connection");
        false
    }
}

/// Fans an event out to every other room member.
///
/// A recipient whose write channel is gone is treated as disconnected:
/// it is torn down and the remaining members are notified of its departure.
/// The broadcaster itself never blocks or retries.
async fn broadcast(state: &Arc<RelayState>, sender_id: Uuid, server_event: &ServerEvent) {
    let failed = send_to_members(state, sender_id, server_event).await;
    for conn_id in failed {
        tracing::warn!(conn_id = %conn_id, "write channel closed, treating as disconnect");
        disconnect(state, conn_id).await;
    }
}

/// Writes one event to all members of the room except `sender_id`, returning
/// the connection ids whose channel send failed.
async fn send_to_members(
    state: &Arc<RelayState>,
    sender_id: Uuid,
    server_event: &ServerEvent,
) -> Vec<Uuid> {
    let text = match event::encode(server_event) {
        Ok(t) => t,
        Err(e) => {
            tracing::error!(error = %e, "failed to encode outbound event");
            return Vec::new();
        }
    };

    let recipients = state.rooms.members_except(DEFAULT_ROOM, sender_id).await;
    let mut failed = Vec::new();
    for conn_id in recipients {
        if let Some(sender) = state.get_sender(conn_id).await
            && sender.send(Message::Text(text.clone().into())).is_err()
        {
            failed.push(conn_id);
        }
    }
    failed
}

/// Removes a connection from the room and announces its departure.
///
/// Safe to call from every exit path (explicit leave, transport close,
/// failed write); only the call that actually removes the member broadcasts
/// the notice. A member that cannot accept the notice is unregistered and
/// left for its own socket task to finish tearing down.
async fn leave_room(state: &Arc<RelayState>, conn_id: Uuid) {
    if let Some(name) = state.rooms.leave(DEFAULT_ROOM, conn_id).await {
        tracing::info!(conn_id = %conn_id, name = %name, room = DEFAULT_ROOM, "member left room");
        let failed = send_to_members(state, conn_id, &ServerEvent::Leave(name)).await;
        for id in failed {
            state.unregister(id).await;
        }
    }
}

/// Full connection teardown: drop the write channel and clear membership.
///
/// Idempotent; the transport layer may report close more than once and the
/// broadcast path may race the socket task here.
async fn disconnect(state: &Arc<RelayState>, conn_id: Uuid) {
    state.unregister(conn_id).await;
    leave_room(state, conn_id).await;
}

/// Liveness endpoint, not part of the relay core.
async fn liveness() -> &'static str {
    LIVENESS_GREETING
}

/// Builds the CORS layer for the WebSocket handshake.
///
/// With no configured origin the layer is permissive; an origin that is not
/// a valid header value falls back to permissive with a warning rather than
/// refusing to start.
fn cors_layer(allowed_origin: Option<&str>) -> CorsLayer {
    match allowed_origin {
        Some(origin) => match origin.parse::<HeaderValue>() {
            Ok(value) => CorsLayer::new().allow_origin(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "invalid allowed origin, using permissive CORS");
                CorsLayer::permissive()
            }
        },
        None => CorsLayer::permissive(),
    }
}

/// Starts the relay server on the given address and returns the bound
/// address and a join handle.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(RelayState::new()), None).await
}

/// Starts the relay server with a pre-built [`RelayState`] and an optional
/// allowed CORS origin from the resolved [`crate::config::RelayConfig`].
///
/// This is the primary entry point used by both `main.rs` and test code;
/// tests bind `127.0.0.1:0` and read the returned address.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<RelayState>,
    allowed_origin: Option<&str>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = axum::Router::new()
        .route("/", axum::routing::get(liveness))
        .route("/ws", axum::routing::get(ws_handler))
        .layer(cors_layer(allowed_origin))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "relay server error");
        }
    });

    Ok((bound_addr, handle))
}

/// axum handler that upgrades an HTTP request to a WebSocket connection.
async fn ws_handler(
    ws: axum::extract::ws::WebSocketUpgrade,
    axum::extract::State(state): axum::extract::State<Arc<RelayState>>,
) -> impl axum::response::IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}
