use std::path::PathBuf;

use crate::bootstrap::IngestContainerSpec;
use crate::encoder::{CaptureDevice, EncoderSettings};

/// Stream API configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Shared secret expected in the `x-gateway-key` header.
    pub gateway_secret: String,
    /// Public base URL the HLS output is served from (e.g. `http://localhost:8080/hls`).
    pub hls_base_url: String,
    /// Host directory the encoder writes HLS segments into.
    pub hls_output_dir: PathBuf,
    /// Encoder binary.
    pub encoder_bin: String,
    pub capture: CaptureDevice,
    pub hls_segment_seconds: u32,
    pub hls_list_size: u32,
    /// Container runtime CLI used for the ingest bootstrap.
    pub docker_bin: String,
    pub ingest_container_name: String,
    pub ingest_image: String,
    pub ingest_rtmp_port: u16,
    pub ingest_http_port: u16,
    /// Mount point of `hls_output_dir` inside the ingest container.
    pub ingest_mount_path: String,
    /// Skip the ingest container check (local development without Docker).
    pub skip_container_bootstrap: bool,
    /// Port the HTTP server binds to.
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Panics with a descriptive message if a required variable is missing.
    pub fn from_env() -> Self {
        Self {
            gateway_secret: required_var("GATEWAY_SECRET"),
            hls_base_url: var_or("HLS_BASE_URL", "http://localhost:8080/hls"),
            hls_output_dir: PathBuf::from(var_or("HLS_OUTPUT_DIR", "./hls")),
            encoder_bin: var_or("ENCODER_BIN", "ffmpeg"),
            capture: CaptureDevice {
                video_format: var_or("CAPTURE_FORMAT", "v4l2"),
                video_device: var_or("CAPTURE_VIDEO_DEVICE", "/dev/video0"),
                audio_format: var_or("CAPTURE_AUDIO_FORMAT", "alsa"),
                audio_device: var_or("CAPTURE_AUDIO_DEVICE", "default"),
            },
            hls_segment_seconds: parsed_or("HLS_SEGMENT_SECONDS", 2),
            hls_list_size: parsed_or("HLS_LIST_SIZE", 6),
            docker_bin: var_or("DOCKER_BIN", "docker"),
            ingest_container_name: var_or("INGEST_CONTAINER_NAME", "lectern-rtmp"),
            ingest_image: var_or("INGEST_IMAGE", "alfg/nginx-rtmp"),
            ingest_rtmp_port: parsed_or("INGEST_RTMP_PORT", 1935),
            ingest_http_port: parsed_or("INGEST_HTTP_PORT", 8080),
            ingest_mount_path: var_or("INGEST_MOUNT_PATH", "/opt/data/hls"),
            skip_container_bootstrap: parsed_or("SKIP_CONTAINER_BOOTSTRAP", false),
            port: parsed_or("PORT", 4011),
        }
    }

    pub fn encoder_settings(&self) -> EncoderSettings {
        EncoderSettings {
            program: self.encoder_bin.clone(),
            output_root: self.hls_output_dir.clone(),
            capture: self.capture.clone(),
            segment_seconds: self.hls_segment_seconds,
            list_size: self.hls_list_size,
        }
    }

    pub fn ingest_spec(&self) -> IngestContainerSpec {
        IngestContainerSpec {
            name: self.ingest_container_name.clone(),
            image: self.ingest_image.clone(),
            rtmp_port: self.ingest_rtmp_port,
            http_port: self.ingest_http_port,
            host_output_dir: self.hls_output_dir.clone(),
            mount_path: self.ingest_mount_path.clone(),
        }
    }
}

fn required_var(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} env var is required"))
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parsed_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    parse_or(name, std::env::var(name).ok(), default)
}

/// Parse a raw variable value. An unset or empty value takes the default;
/// a value that does not parse takes it too, with a warning.
pub(crate) fn parse_or<T: std::str::FromStr>(name: &str, raw: Option<String>, default: T) -> T {
    let Some(raw) = raw.filter(|v| !v.trim().is_empty()) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "unparseable value, using default");
            default
        }
    }
}
