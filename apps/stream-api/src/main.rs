use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stream_api::bootstrap::{ensure_ingest_container, DockerCli};
use stream_api::config::Config;
use stream_api::encoder::{EncoderManager, SystemProcessControl};
use stream_api::gateway::StreamGateway;
use stream_api::AppState;

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

    // Ingest must be available before any session can go live.
    if config.skip_container_bootstrap {
        tracing::warn!("ingest container bootstrap skipped");
    } else {
        let docker = DockerCli::new(&config.docker_bin);
        if let Err(err) = ensure_ingest_container(&docker, &config.ingest_spec()).await {
            tracing::error!(error = %err, "cannot prepare ingest infrastructure");
            std::process::exit(1);
        }
    }

    let encoder = Arc::new(EncoderManager::new(
        config.encoder_settings(),
        Arc::new(SystemProcessControl),
    ));
    let gateway = Arc::new(StreamGateway::new(encoder.clone(), &config.hls_base_url));

    tracing::info!(
        hls_base_url = %config.hls_base_url,
        hls_output_dir = %config.hls_output_dir.display(),
        encoder = %config.encoder_bin,
        "stream-api configured"
    );

    let state = AppState {
        config: Arc::new(config),
        gateway,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(stream_api::routes::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "stream-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!(active = encoder.active().len(), "stopping running encoders");
    encoder.stop_all().await;
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(?e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
