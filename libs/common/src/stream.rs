//! Wire contract between the schedule service and the streaming gateway.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Header carrying the shared service-to-service secret.
pub const GATEWAY_KEY_HEADER: &str = "x-gateway-key";

pub const START_STREAM_PATH: &str = "/live/stream/start-stream";
pub const STOP_STREAM_PATH: &str = "/live/stream/stop-stream";

/// Playlist file name written by the encoder inside each stream directory.
pub const PLAYLIST_FILE: &str = "index.m3u8";

/// Derive the stream key for a session. Deterministic: the same session always
/// maps to the same ingest and delivery path.
pub fn stream_key(session_id: &str) -> String {
    format!("live_{session_id}")
}

/// Compose the externally reachable playlist URL for a stream key.
pub fn delivery_url(hls_base: &str, stream_key: &str) -> String {
    format!(
        "{}/{}/{}",
        hls_base.trim_end_matches('/'),
        stream_key,
        PLAYLIST_FILE
    )
}

/// Body of both `start-stream` and `stop-stream`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StreamRequest {
    pub session_id: String,
}

/// Response of both gateway endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct StreamResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(
        rename = "streamKey",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub stream_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StreamResponse {
    pub fn started(url: String, stream_key: String) -> Self {
        Self {
            success: true,
            url: Some(url),
            stream_key: Some(stream_key),
            message: None,
        }
    }

    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            ..Self::default()
        }
    }
}
