//! Room registry: process-wide map from room id to live `Room`.
//!
//! The registry is dependency-injected through `AppState` (never a
//! global) and guarantees at most one `Room` instance per id. Rooms are
//! created lazily on first subscription and evicted once their last
//! member leaves; both transitions happen under the registry's map
//! lock so a subscriber can never land in a room that was concurrently
//! evicted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

use super::connection::ConnectionHandle;
use super::room::Room;

pub struct RoomRegistry {
    rooms: Mutex<HashMap<String, Arc<Room>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve the room for an id, creating it on first reference.
    /// Concurrent callers racing on an unseen id all receive the same
    /// instance; check-then-insert is atomic under the map lock.
    pub fn get_or_create(&self, room_id: &str) -> Arc<Room> {
        let mut rooms = self.lock_rooms();
        Self::get_or_create_locked(&mut rooms, room_id)
    }

    pub fn get(&self, room_id: &str) -> Option<Arc<Room>> {
        self.lock_rooms().get(room_id).cloned()
    }

    pub fn room_count(&self) -> usize {
        self.lock_rooms().len()
    }

    fn lock_rooms(&self) -> MutexGuard<'_, HashMap<String, Arc<Room>>> {
        // The map stays structurally valid even if a holder panicked.
        self.rooms.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn get_or_create_locked(
        rooms: &mut HashMap<String, Arc<Room>>,
        room_id: &str,
    ) -> Arc<Room> {
        if let Some(room) = rooms.get(room_id) {
            return room.clone();
        }
        let room = Arc::new(Room::new(room_id.to_owned()));
        rooms.insert(room_id.to_owned(), room.clone());
        debug!(room = room_id, "Created room");
        room
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII membership in a room.
///
/// Construction performs get-or-create plus subscribe atomically under
/// the registry lock; `Drop` performs unsubscribe plus evict-if-empty
/// under the same lock. The drop path runs exactly once on every
/// session exit, including unwinds, which is what makes teardown
/// unconditional.
pub struct RoomSubscription {
    registry: Arc<RoomRegistry>,
    room: Arc<Room>,
    conn_id: Uuid,
}

impl RoomSubscription {
    pub fn subscribe(
        registry: Arc<RoomRegistry>,
        room_id: &str,
        handle: ConnectionHandle,
    ) -> Self {
        let conn_id = handle.id();
        let room = {
            let mut rooms = registry.lock_rooms();
            let room = RoomRegistry::get_or_create_locked(&mut rooms, room_id);
            room.subscribe(handle);
            room
        };
        Self {
            registry,
            room,
            conn_id,
        }
    }

    pub fn room(&self) -> &Arc<Room> {
        &self.room
    }

    pub fn conn_id(&self) -> Uuid {
        self.conn_id
    }
}

impl Drop for RoomSubscription {
    fn drop(&mut self) {
        let mut rooms = self.registry.lock_rooms();
        self.room.unsubscribe(self.conn_id);
        // Only evict the instance this subscription belongs to. After a
        // publish evicted every member, an earlier drop may already have
        // removed this room and a new subscriber re-created the id; a
        // stale drop must not take the live replacement down with it.
        if self.room.member_count() == 0
            && rooms
                .get(self.room.id())
                .is_some_and(|current| Arc::ptr_eq(current, &self.room))
        {
            rooms.remove(self.room.id());
            debug!(room = self.room.id(), "Evicted empty room");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn handle() -> (ConnectionHandle, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ConnectionHandle::new(tx), rx)
    }

    #[test]
    fn get_or_create_returns_same_instance() {
        let registry = RoomRegistry::new();
        let a = registry.get_or_create("r-1");
        let b = registry.get_or_create("r-1");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.room_count(), 1);
    }

    #[test]
    fn distinct_ids_get_distinct_rooms() {
        let registry = RoomRegistry::new();
        let a = registry.get_or_create("r-1");
        let b = registry.get_or_create("r-2");
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.room_count(), 2);
    }

    #[test]
    fn concurrent_get_or_create_is_single_winner() {
        let registry = Arc::new(RoomRegistry::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            handles.push(std::thread::spawn(move || registry.get_or_create("contested")));
        }

        let rooms: Vec<Arc<Room>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for room in &rooms[1..] {
            assert!(Arc::ptr_eq(&rooms[0], room));
        }
        assert_eq!(registry.room_count(), 1);
    }

    #[test]
    fn subscription_drop_evicts_empty_room() {
        let registry = Arc::new(RoomRegistry::new());
        let (h, _rx) = handle();
        let sub = RoomSubscription::subscribe(registry.clone(), "r-1", h);
        assert_eq!(registry.room_count(), 1);
        assert_eq!(sub.room().member_count(), 1);

        drop(sub);
        assert_eq!(registry.room_count(), 0);
    }

    #[test]
    fn room_with_remaining_members_survives() {
        let registry = Arc::new(RoomRegistry::new());
        let (h1, _rx1) = handle();
        let (h2, _rx2) = handle();
        let sub1 = RoomSubscription::subscribe(registry.clone(), "r-1", h1);
        let sub2 = RoomSubscription::subscribe(registry.clone(), "r-1", h2);
        assert!(Arc::ptr_eq(sub1.room(), sub2.room()));

        drop(sub1);
        assert_eq!(registry.room_count(), 1);
        assert_eq!(sub2.room().member_count(), 1);

        drop(sub2);
        assert_eq!(registry.room_count(), 0);
    }

    #[test]
    fn resubscribing_after_eviction_creates_fresh_room() {
        let registry = Arc::new(RoomRegistry::new());
        let (h1, _rx1) = handle();
        let sub1 = RoomSubscription::subscribe(registry.clone(), "r-1", h1);
        let first = sub1.room().clone();
        drop(sub1);

        let (h2, _rx2) = handle();
        let sub2 = RoomSubscription::subscribe(registry.clone(), "r-1", h2);
        assert!(!Arc::ptr_eq(&first, sub2.room()));
        assert_eq!(registry.room_count(), 1);
    }

    #[test]
    fn drop_tolerates_prior_eviction_by_publish() {
        let registry = Arc::new(RoomRegistry::new());
        let (tx, rx) = mpsc::unbounded_channel::<String>();
        let h = ConnectionHandle::new(tx);
        let sub = RoomSubscription::subscribe(registry.clone(), "r-1", h);

        // Kill the channel, then publish: the member gets evicted inside publish
        drop(rx);
        sub.room().publish("x");
        assert_eq!(sub.room().member_count(), 0);

        // Dropping the subscription afterwards must not panic and still evicts the room
        drop(sub);
        assert_eq!(registry.room_count(), 0);
    }

    #[test]
    fn stale_drop_leaves_replacement_room_alone() {
        let registry = Arc::new(RoomRegistry::new());

        // Two members whose channels are already dead
        let dead = || {
            let (tx, rx) = mpsc::unbounded_channel::<String>();
            drop(rx);
            ConnectionHandle::new(tx)
        };
        let sub1 = RoomSubscription::subscribe(registry.clone(), "r-1", dead());
        let sub2 = RoomSubscription::subscribe(registry.clone(), "r-1", dead());

        // A publish evicts both, leaving the room empty while both
        // subscription guards are still alive
        assert_eq!(sub1.room().publish("x"), 0);
        assert_eq!(sub1.room().member_count(), 0);

        // First drop evicts the empty room; a fresh subscriber then
        // re-creates the id with a new instance
        drop(sub1);
        assert_eq!(registry.room_count(), 0);
        let (h, _rx) = handle();
        let sub3 = RoomSubscription::subscribe(registry.clone(), "r-1", h);

        // The second, stale drop must not evict the live replacement
        drop(sub2);
        assert_eq!(registry.room_count(), 1);
        let current = registry.get("r-1").unwrap();
        assert!(Arc::ptr_eq(&current, sub3.room()));
        assert_eq!(sub3.room().member_count(), 1);
    }
}
