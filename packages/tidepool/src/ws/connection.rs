use tokio::sync::mpsc;
use uuid::Uuid;

/// Delivery failure: the session side of the channel is gone. The room
/// treats the member as dead and evicts it.
#[derive(Debug, thiserror::Error)]
#[error("connection channel closed")]
pub struct ConnectionClosed;

/// The room-facing half of one live WebSocket connection.
///
/// The session owns the socket and the receiving end of the outbound
/// channel; the room's member set stores only this handle. Dropping the
/// handle (eviction or unsubscribe) closes the channel, which ends the
/// session's forwarder task and with it the socket — closing is always
/// driven from the session side, never by the room directly.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: Uuid,
    tx: mpsc::UnboundedSender<String>,
}

impl ConnectionHandle {
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tx,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Queue a payload for delivery. Non-blocking; fails only when the
    /// receiving session has gone away.
    pub fn send(&self, payload: &str) -> Result<(), ConnectionClosed> {
        self.tx
            .send(payload.to_owned())
            .map_err(|_| ConnectionClosed)
    }
}
