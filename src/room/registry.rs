//! Room registry - every open room by id

use super::{Room, RoomId};
use crate::session::Session;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Open rooms, ids allocated from a monotonic counter
pub struct RoomRegistry {
    rooms: RwLock<BTreeMap<RoomId, Arc<Room>>>,
    next_id: AtomicU64,
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self {
            rooms: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a room for two participants
    ///
    /// The caller must hold both sessions' state locks and have checked that both are free.
    pub(crate) async fn open(&self, a: Arc<Session>, b: Arc<Session>) -> Arc<Room> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let room = Arc::new(Room::open(id, a, b));
        self.rooms.write().await.insert(id, Arc::clone(&room));
        room
    }

    pub async fn get(&self, id: RoomId) -> Option<Arc<Room>> {
        self.rooms.read().await.get(&id).cloned()
    }

    pub async fn remove(&self, id: RoomId) -> Option<Arc<Room>> {
        self.rooms.write().await.remove(&id)
    }

    /// Snapshot of open rooms in id order
    pub async fn list(&self) -> Vec<Arc<Room>> {
        self.rooms.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rooms.read().await.is_empty()
    }
}
