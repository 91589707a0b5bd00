//! Request-facing start/stop contract over the encoder manager.

use std::sync::Arc;

use lectern_common::stream;

use crate::encoder::{ActiveEncode, EncoderError, EncoderManager, StopOutcome};

/// A started stream as seen by callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamStarted {
    pub url: String,
    pub stream_key: String,
}

/// Translates encoder results into externally reachable delivery URLs.
pub struct StreamGateway {
    encoder: Arc<EncoderManager>,
    hls_base_url: String,
}

impl StreamGateway {
    pub fn new(encoder: Arc<EncoderManager>, hls_base_url: impl Into<String>) -> Self {
        Self {
            encoder,
            hls_base_url: hls_base_url.into(),
        }
    }

    pub async fn start(&self, session_id: &str) -> Result<StreamStarted, EncoderError> {
        let started = self.encoder.start(session_id).await?;
        Ok(StreamStarted {
            url: stream::delivery_url(&self.hls_base_url, &started.stream_key),
            stream_key: started.stream_key,
        })
    }

    pub async fn stop(&self, session_id: &str) -> Result<StopOutcome, EncoderError> {
        self.encoder.stop(session_id).await
    }

    pub fn active(&self) -> Vec<ActiveEncode> {
        self.encoder.active()
    }

    pub fn encoder(&self) -> &Arc<EncoderManager> {
        &self.encoder
    }
}
