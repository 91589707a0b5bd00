//! Per-room viewer membership.
//!
//! Members are connection ids, so one browser tab counts once per room no
//! matter how often it sends `join`. Rooms are created on first join and
//! never removed; an empty set is harmless.

use std::collections::HashSet;

use dashmap::DashMap;

pub struct RoomPresence {
    rooms: DashMap<String, HashSet<String>>,
}

impl RoomPresence {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    /// Add `member` to `room_id` and hand the new count to `announce` while
    /// the room is still locked, so announcements reach the broadcast channel
    /// in membership order. Returns whether `member` was not already present.
    pub fn join(&self, room_id: &str, member: &str, announce: impl FnOnce(usize)) -> bool {
        let mut entry = self.rooms.entry(room_id.to_string()).or_default();
        let added = entry.insert(member.to_string());
        announce(entry.len());
        added
    }

    /// Remove `member` from one room. `announce` runs under the room lock and
    /// only if the member was there. Returns whether it was.
    pub fn leave(&self, room_id: &str, member: &str, announce: impl FnOnce(usize)) -> bool {
        let Some(mut entry) = self.rooms.get_mut(room_id) else {
            return false;
        };
        if !entry.remove(member) {
            return false;
        }
        announce(entry.len());
        true
    }

    /// Remove `member` from every room it joined, announcing each affected
    /// room's new count under that room's lock. Returns the affected rooms.
    pub fn remove_member(
        &self,
        member: &str,
        mut announce: impl FnMut(&str, usize),
    ) -> Vec<String> {
        let mut affected = Vec::new();
        for mut entry in self.rooms.iter_mut() {
            if entry.value_mut().remove(member) {
                announce(entry.key(), entry.value().len());
                affected.push(entry.key().clone());
            }
        }
        affected.sort();
        affected
    }

    pub fn count(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map_or(0, |members| members.len())
    }
}

impl Default for RoomPresence {
    fn default() -> Self {
        Self::new()
    }
}
