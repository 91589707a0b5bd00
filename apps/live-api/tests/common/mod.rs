#![allow(dead_code)]

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use parking_lot::Mutex;

use live_api::channel::{ChannelBroadcast, RoomPresence};
use live_api::config::{Config, StoreKind};
use live_api::db::MemorySessionStore;
use live_api::schedule::ScheduleService;
use live_api::upstream::{GatewayError, StreamStarted, StreamingGateway};
use live_api::AppState;

pub const HLS_BASE: &str = "http://cdn.test/hls";

/// In-process stand-in for the stream-api. Tracks which sessions are encoding.
#[derive(Default)]
pub struct FakeGateway {
    pub fail_start: Mutex<bool>,
    pub active: Mutex<HashSet<String>>,
    pub bearers: Mutex<Vec<String>>,
}

impl FakeGateway {
    pub fn is_encoding(&self, session_id: &str) -> bool {
        self.active.lock().contains(session_id)
    }
}

#[async_trait]
impl StreamingGateway for FakeGateway {
    async fn start(&self, session_id: &str, bearer: &str) -> Result<StreamStarted, GatewayError> {
        self.bearers.lock().push(bearer.to_string());
        if *self.fail_start.lock() {
            return Err(GatewayError::Rejected {
                status: 500,
                message: "encoder could not be spawned".to_string(),
            });
        }
        if !self.active.lock().insert(session_id.to_string()) {
            return Err(GatewayError::Rejected {
                status: 409,
                message: format!("session {session_id} is already encoding"),
            });
        }
        let stream_key = lectern_common::stream::stream_key(session_id);
        Ok(StreamStarted {
            url: lectern_common::stream::delivery_url(HLS_BASE, &stream_key),
            stream_key,
        })
    }

    async fn stop(&self, session_id: &str, bearer: &str) -> Result<(), GatewayError> {
        self.bearers.lock().push(bearer.to_string());
        self.active.lock().remove(session_id);
        Ok(())
    }
}

pub fn test_config() -> Config {
    Config {
        database_url: None,
        stream_api_url: "http://stream-api.test".to_string(),
        gateway_secret: "test-gateway-secret".to_string(),
        store: StoreKind::Memory,
        port: 0,
    }
}

/// Application state backed by the in-memory store and a fake gateway.
pub fn test_state() -> (AppState, Arc<FakeGateway>) {
    let gateway = Arc::new(FakeGateway::default());
    let schedule = ScheduleService::new(Arc::new(MemorySessionStore::new()), gateway.clone());
    let state = AppState {
        config: Arc::new(test_config()),
        schedule: Arc::new(schedule),
        broadcast: ChannelBroadcast::new(),
        presence: Arc::new(RoomPresence::new()),
    };
    (state, gateway)
}

pub fn test_app() -> (Router, AppState, Arc<FakeGateway>) {
    let (state, gateway) = test_state();
    let app = live_api::routes::router().with_state(state.clone());
    (app, state, gateway)
}

/// Serve the app on an ephemeral port for WebSocket tests.
pub async fn start_server() -> (SocketAddr, AppState) {
    let (app, state, _gateway) = test_app();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}
