use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use tokio::process::{Child, Command};

use stream_api::config::Config;
use stream_api::encoder::process::kill_pid;
use stream_api::encoder::{CaptureDevice, CommandSpec, EncoderManager, ProcessControl};
use stream_api::gateway::StreamGateway;
use stream_api::AppState;

pub const GATEWAY_SECRET: &str = "test-gateway-secret";
pub const HLS_BASE: &str = "http://cdn.test/hls";

/// Runs `sleep` instead of the real encoder.
pub struct SleepProcess;

impl ProcessControl for SleepProcess {
    fn spawn(&self, _spec: &CommandSpec) -> io::Result<Child> {
        Command::new("sleep").arg("30").kill_on_drop(true).spawn()
    }

    fn terminate(&self, pid: u32) -> io::Result<()> {
        kill_pid(pid)
    }
}

pub fn test_config(output_dir: PathBuf) -> Config {
    Config {
        gateway_secret: GATEWAY_SECRET.to_string(),
        hls_base_url: HLS_BASE.to_string(),
        hls_output_dir: output_dir,
        encoder_bin: "ffmpeg".to_string(),
        capture: CaptureDevice {
            video_format: "v4l2".to_string(),
            video_device: "/dev/video0".to_string(),
            audio_format: "alsa".to_string(),
            audio_device: "default".to_string(),
        },
        hls_segment_seconds: 2,
        hls_list_size: 6,
        docker_bin: "docker".to_string(),
        ingest_container_name: "lectern-rtmp-test".to_string(),
        ingest_image: "alfg/nginx-rtmp".to_string(),
        ingest_rtmp_port: 1935,
        ingest_http_port: 8080,
        ingest_mount_path: "/opt/data/hls".to_string(),
        skip_container_bootstrap: true,
        port: 0,
    }
}

/// Build the full application router wired to a fresh state.
///
/// The returned `TempDir` owns the HLS output directory; keep it alive for the
/// duration of the test.
pub fn test_app() -> (Router, AppState, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = test_config(dir.path().to_path_buf());

    let encoder = Arc::new(EncoderManager::new(
        config.encoder_settings(),
        Arc::new(SleepProcess),
    ));
    let gateway = Arc::new(StreamGateway::new(encoder, &config.hls_base_url));

    let state = AppState {
        config: Arc::new(config),
        gateway,
    };
    let app = stream_api::routes::router().with_state(state.clone());
    (app, state, dir)
}
