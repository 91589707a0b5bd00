//! Real-time presence and commentary for live rooms.

pub mod events;
pub mod fanout;
pub mod presence;
pub mod server;

pub use fanout::{ChannelBroadcast, Scope};
pub use presence::RoomPresence;
