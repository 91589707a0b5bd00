use ulid::Ulid;

/// Builds an identifier of the form `<prefix>_<ulid>`.
///
/// ULIDs sort by creation time, so ids minted for the same prefix order the
/// way they were issued.
///
/// ```
/// let room = lectern_common::id::prefixed_ulid("room");
/// assert!(room.starts_with("room_"));
/// ```
pub fn prefixed_ulid(prefix: &str) -> String {
    format!("{prefix}_{}", Ulid::new())
}

/// Records whose ids carry a fixed prefix.
pub trait PrefixedId {
    const PREFIX: &'static str;

    fn generate() -> String {
        prefixed_ulid(Self::PREFIX)
    }
}

pub mod prefix {
    /// Scheduled live session.
    pub const LIVE_SESSION: &str = "lvs";
    /// Presence room attached to a live session.
    pub const ROOM: &str = "room";
    /// One WebSocket connection on the commentary channel.
    pub const CONNECTION: &str = "conn";
}
