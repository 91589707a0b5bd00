//! Client side of the streaming gateway contract.

mod client;

pub use client::HttpStreamingGateway;

use async_trait::async_trait;

/// Delivery details returned by a successful start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamStarted {
    pub url: String,
    pub stream_key: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("streaming gateway unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("streaming gateway rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("streaming gateway returned an unusable response: {0}")]
    Malformed(String),
}

/// Start/stop operations the schedule drives on status transitions.
///
/// `bearer` is the caller's credential, forwarded unchanged.
#[async_trait]
pub trait StreamingGateway: Send + Sync {
    async fn start(&self, session_id: &str, bearer: &str) -> Result<StreamStarted, GatewayError>;

    async fn stop(&self, session_id: &str, bearer: &str) -> Result<(), GatewayError>;
}
