use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use live_api::channel::{ChannelBroadcast, RoomPresence};
use live_api::config::{Config, StoreKind};
use live_api::db::{MemorySessionStore, PgSessionStore, SessionFilter, SessionStore};
use live_api::models::live_session::LiveStatus;
use live_api::schedule::ScheduleService;
use live_api::upstream::HttpStreamingGateway;
use live_api::AppState;

const DB_POOL_SIZE: usize = 16;

#[tokio::main]
async fn main() {
    // Load .env file (silently skip if missing; env vars may be set externally)
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let port = config.port;

    let store: Arc<dyn SessionStore> = match (config.store, config.database_url.as_deref()) {
        (StoreKind::Postgres, Some(url)) => {
            let db = live_api::db::pool::connect(url, DB_POOL_SIZE)
                .expect("failed to create database pool");
            Arc::new(PgSessionStore::new(db))
        }
        _ => {
            tracing::warn!("using in-memory session store; sessions are lost on restart");
            Arc::new(MemorySessionStore::new())
        }
    };

    warn_orphaned_sessions(store.as_ref()).await;

    let gateway = HttpStreamingGateway::new(&config.stream_api_url, &config.gateway_secret)
        .expect("failed to build streaming gateway client");

    tracing::info!(stream_api_url = %config.stream_api_url, "live-api configured");

    let state = AppState {
        config: Arc::new(config),
        schedule: Arc::new(ScheduleService::new(store, Arc::new(gateway))),
        broadcast: ChannelBroadcast::new(),
        presence: Arc::new(RoomPresence::new()),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(live_api::routes::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "live-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app).await.expect("server error");
}

/// Sessions left `live` by a previous run have no encoder behind them any more.
/// They are reported, not modified.
async fn warn_orphaned_sessions(store: &dyn SessionStore) {
    let filter = SessionFilter {
        status: Some(LiveStatus::Live),
        ..Default::default()
    };
    match store.list(&filter).await {
        Ok(sessions) if sessions.is_empty() => {}
        Ok(sessions) => {
            let ids: Vec<&str> = sessions.iter().map(|s| s.id.as_str()).collect();
            tracing::warn!(
                count = ids.len(),
                sessions = ?ids,
                "sessions persisted as live from a previous run; their streams are not running"
            );
        }
        Err(err) => {
            tracing::warn!(error = %err, "could not check for orphaned live sessions");
        }
    }
}
