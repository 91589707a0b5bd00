pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod encoder;
pub mod error;
pub mod gateway;
pub mod routes;

use std::sync::Arc;

use config::Config;
use gateway::StreamGateway;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub gateway: Arc<StreamGateway>,
}
