pub mod auth;
pub mod channel;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod schedule;
pub mod upstream;

use std::sync::Arc;

use channel::{ChannelBroadcast, RoomPresence};
use config::Config;
use schedule::ScheduleService;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub schedule: Arc<ScheduleService>,
    pub broadcast: ChannelBroadcast,
    pub presence: Arc<RoomPresence>,
}
