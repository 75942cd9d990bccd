use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::dto::sse::ServerEvent;

/// Per-room SSE hubs, created lazily on first use.
pub struct RoomHubs {
    hubs: DashMap<String, SseHub>,
    capacity: usize,
}

impl RoomHubs {
    /// Build an empty registry whose hubs use the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            hubs: DashMap::new(),
            capacity,
        }
    }

    /// Hub of `room_id`, creating it when missing.
    pub fn hub(&self, room_id: &str) -> SseHub {
        if let Some(hub) = self.hubs.get(room_id) {
            return hub.clone();
        }
        self.hubs
            .entry(room_id.to_string())
            .or_insert_with(|| SseHub::new(self.capacity))
            .clone()
    }

    /// Send an event to the room's listeners, if the room has a hub.
    pub fn broadcast(&self, room_id: &str, event: ServerEvent) -> usize {
        let hub = self.hubs.get(room_id).map(|hub| hub.clone());
        hub.map(|hub| hub.broadcast(event)).unwrap_or_default()
    }

    /// Drop the hub of a room that no longer exists.
    pub fn remove(&self, room_id: &str) {
        self.hubs.remove(room_id);
    }
}

/// Simple broadcast hub wrapper used by the SSE services.
#[derive(Clone)]
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers and return how many got it.
    pub fn broadcast(&self, event: ServerEvent) -> usize {
        self.sender.send(event).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hubs_are_shared_per_room() {
        let hubs = RoomHubs::new(4);
        let mut first = hubs.hub("r1").subscribe();
        let _other = hubs.hub("r2").subscribe();

        let delivered = hubs.broadcast("r1", ServerEvent::new(Some("ping".into()), "{}".into()));
        assert_eq!(delivered, 1);
        assert_eq!(first.try_recv().unwrap().event.as_deref(), Some("ping"));
        assert_eq!(hubs.broadcast("missing", ServerEvent::new(None, "x".into())), 0);
    }
}
