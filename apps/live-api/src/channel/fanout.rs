//! Broadcast hub for presence channel events.
//!
//! One `tokio::sync::broadcast` channel; every connection subscribes and
//! filters room-scoped events against the rooms it has joined.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::broadcast;

use super::events::ServerFrame;

/// Slow receivers that fall this far behind skip messages.
const BROADCAST_CAPACITY: usize = 4096;

/// Who receives an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Every connected client.
    All,
    /// Only connections currently joined to the room.
    Room(String),
}

impl Scope {
    pub fn includes(&self, joined: &HashSet<String>) -> bool {
        match self {
            Scope::All => true,
            Scope::Room(room_id) => joined.contains(room_id),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChannelEvent {
    pub scope: Scope,
    pub frame: ServerFrame,
}

/// Cloneable handle to the broadcast channel; stored in `AppState`.
#[derive(Clone)]
pub struct ChannelBroadcast {
    sender: broadcast::Sender<Arc<ChannelEvent>>,
}

impl ChannelBroadcast {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ChannelEvent>> {
        self.sender.subscribe()
    }

    pub fn dispatch(&self, scope: Scope, frame: ServerFrame) {
        // No receivers is fine.
        let _ = self.sender.send(Arc::new(ChannelEvent { scope, frame }));
    }
}

impl Default for ChannelBroadcast {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_scope_requires_membership() {
        let joined: HashSet<String> = ["room_a".to_string()].into_iter().collect();
        assert!(Scope::All.includes(&HashSet::new()));
        assert!(Scope::Room("room_a".into()).includes(&joined));
        assert!(!Scope::Room("room_b".into()).includes(&joined));
    }

    #[tokio::test]
    async fn subscribers_receive_dispatched_events() {
        let hub = ChannelBroadcast::new();
        let mut rx = hub.subscribe();

        hub.dispatch(Scope::All, ServerFrame::viewer_count("room_a", 1));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.scope, Scope::All);
        assert_eq!(event.frame.data["count"], 1);
    }
}
