//! Room session: the per-connection control loop.
//!
//! One task per accepted socket. Validation and upgrade already
//! happened in the HTTP handler; this loop does subscribe → receive →
//! persist → broadcast → teardown. The subscription guard lives on
//! this stack, so release runs exactly once on every exit path.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::AppState;
use crate::metrics::ServerMetrics;
use crate::models::{MessageWithAuthor, User};

use super::connection::ConnectionHandle;
use super::protocol::InboundPayload;
use super::registry::RoomSubscription;
use super::room::Room;

/// Durable storage boundary for the session loop. A message must be
/// stored (assigned an id and timestamp) before it may be broadcast.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn store_message(
        &self,
        room: &crate::models::Room,
        author: &User,
        content: &str,
    ) -> anyhow::Result<MessageWithAuthor>;
}

/// Drive one client's participation in one room until the socket
/// closes or errors.
pub async fn run_room_session(
    socket: WebSocket,
    state: AppState,
    room: crate::models::Room,
    user: User,
) {
    state.metrics.connection_opened();

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Outbound channel: the room writes into it, the forwarder below
    // drains it into the socket.
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let handle = ConnectionHandle::new(tx);
    let conn_id = handle.id();

    let subscription = RoomSubscription::subscribe(state.registry.clone(), &room.id, handle);
    info!(room = %room.id, user = %user.username, conn = %conn_id, "Room session subscribed");

    let forwarder = async move {
        while let Some(payload) = rx.recv().await {
            if ws_sender.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    };

    let receive_loop = async {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    state.metrics.message_received();
                    receive_payload(
                        state.repository.as_ref(),
                        subscription.room(),
                        &room,
                        &user,
                        &text,
                        &state.metrics,
                    )
                    .await;
                }
                Ok(Message::Close(_)) => {
                    debug!(conn = %conn_id, "Client requested close");
                    break;
                }
                // Ping/pong is answered by axum itself
                Ok(_) => {}
                Err(e) => {
                    warn!(conn = %conn_id, "WebSocket read error: {}", e);
                    state.metrics.websocket_error();
                    break;
                }
            }
        }
    };

    // Either side ending tears the session down: a dead socket ends the
    // forwarder, a read error or close ends the receive loop.
    tokio::select! {
        _ = forwarder => {}
        _ = receive_loop => {}
    }

    state.metrics.connection_closed();
    info!(room = %room.id, user = %user.username, conn = %conn_id, "Room session closed");
    // `subscription` drops here: unsubscribe + evict-if-empty.
}

/// Handle one inbound frame: parse, persist, then broadcast.
///
/// Failure semantics: a malformed payload is skipped (never broadcast
/// as empty content), a persistence failure drops the message but
/// keeps the session alive, and only the successful, stored form is
/// fanned out.
pub(crate) async fn receive_payload<S: MessageStore + ?Sized>(
    store: &S,
    members: &Room,
    room: &crate::models::Room,
    author: &User,
    text: &str,
    metrics: &ServerMetrics,
) {
    let payload: InboundPayload = match serde_json::from_str(text) {
        Ok(p) => p,
        Err(e) => {
            warn!(room = %room.id, "Ignoring malformed payload: {}", e);
            metrics.message_dropped();
            return;
        }
    };

    let stored = match store.store_message(room, author, &payload.content).await {
        Ok(stored) => stored,
        Err(e) => {
            warn!(room = %room.id, "Failed to persist message, dropping: {}", e);
            metrics.persistence_error();
            metrics.message_dropped();
            return;
        }
    };
    metrics.message_persisted();

    match serde_json::to_string(&stored) {
        Ok(json) => {
            let delivered = members.publish(&json);
            metrics.messages_broadcast(delivered as u64);
        }
        Err(e) => {
            warn!(room = %room.id, "Failed to serialize stored message: {}", e);
        }
    }
}
