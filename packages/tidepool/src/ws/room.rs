use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use super::connection::ConnectionHandle;

/// One fan-out unit: the set of connections subscribed to a room id.
///
/// The member set is guarded by a std mutex rather than a tokio one:
/// nothing awaits while the guard is held (fan-out is a loop of
/// non-blocking channel sends), and a sync guard lets the subscription
/// release path run from `Drop`. The guard is held for the whole
/// publish loop, so a publish never races a concurrent
/// subscribe/unsubscribe on the same room.
pub struct Room {
    id: String,
    members: Mutex<HashMap<Uuid, ConnectionHandle>>,
}

impl Room {
    pub(super) fn new(id: String) -> Self {
        Self {
            id,
            members: Mutex::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Add a connection to the member set. The map key is the
    /// connection id, so re-subscribing the same handle is a no-op
    /// replacement rather than a duplicate.
    pub fn subscribe(&self, handle: ConnectionHandle) {
        let mut members = lock_members(&self.members);
        members.insert(handle.id(), handle);
    }

    /// Remove a connection from the member set. Safe to call when the
    /// connection was already evicted by a failed publish; returns
    /// whether anything was removed.
    pub fn unsubscribe(&self, conn_id: Uuid) -> bool {
        let mut members = lock_members(&self.members);
        members.remove(&conn_id).is_some()
    }

    /// Deliver a payload to every member. A member whose channel is
    /// closed is dead: it is evicted here and its handle dropped, and
    /// the failure is never surfaced to the publisher. Returns the
    /// number of successful deliveries.
    pub fn publish(&self, payload: &str) -> usize {
        let mut members = lock_members(&self.members);

        let mut dead = Vec::new();
        let mut delivered = 0;
        for (conn_id, handle) in members.iter() {
            match handle.send(payload) {
                Ok(()) => delivered += 1,
                Err(_) => dead.push(*conn_id),
            }
        }

        for conn_id in dead {
            warn!(room = %self.id, conn = %conn_id, "Evicting dead connection during publish");
            members.remove(&conn_id);
        }

        debug!(room = %self.id, delivered, "Published payload");
        delivered
    }

    pub fn member_count(&self) -> usize {
        lock_members(&self.members).len()
    }

    pub fn is_member(&self, conn_id: Uuid) -> bool {
        lock_members(&self.members).contains_key(&conn_id)
    }
}

/// Membership must survive a panicked holder; a poisoned lock still
/// guards a structurally valid map.
fn lock_members<'a>(
    members: &'a Mutex<HashMap<Uuid, ConnectionHandle>>,
) -> std::sync::MutexGuard<'a, HashMap<Uuid, ConnectionHandle>> {
    members.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
