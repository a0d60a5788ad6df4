use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tally_core::RoomId;

use crate::config::RoomConfig;
use crate::room_actor::{RetireHook, RoomHandle};

/// Room id to running actor. Rooms are created on first join; an actor that
/// retires while idle removes its own entry.
#[derive(Clone)]
pub struct RoomRegistry {
    rooms: Arc<RwLock<HashMap<RoomId, RoomHandle>>>,
    config: RoomConfig,
}

impl RoomRegistry {
    pub fn new(config: RoomConfig) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    pub fn get(&self, room_id: &RoomId) -> Option<RoomHandle> {
        self.rooms
            .read()
            .get(room_id)
            .filter(|handle| !handle.is_closed())
            .cloned()
    }

    /// Returns the actor for `room_id`, spawning it if the room has no live
    /// actor.
    pub fn get_or_spawn(&self, room_id: &RoomId) -> RoomHandle {
        if let Some(handle) = self.get(room_id) {
            return handle;
        }

        let mut rooms = self.rooms.write();
        if let Some(handle) = rooms.get(room_id).filter(|handle| !handle.is_closed()) {
            return handle.clone();
        }

        let handle = RoomHandle::spawn_with_hook(
            room_id.clone(),
            self.config.clone(),
            Some(self.retire_hook()),
        );
        rooms.insert(room_id.clone(), handle.clone());
        tracing::info!(room_id = %room_id, actor_id = handle.actor_id(), "Room opened");
        handle
    }

    fn retire_hook(&self) -> RetireHook {
        let rooms = Arc::downgrade(&self.rooms);
        Box::new(move |room_id, actor_id| {
            let Some(rooms) = rooms.upgrade() else {
                return;
            };
            let mut rooms = rooms.write();
            // A replacement actor may already own the slot.
            if rooms
                .get(room_id)
                .is_some_and(|handle| handle.actor_id() == actor_id)
            {
                rooms.remove(room_id);
                tracing::info!(room_id = %room_id, actor_id, "Room closed");
            }
        })
    }

    pub fn len(&self) -> usize {
        self.rooms.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.read().is_empty()
    }
}
