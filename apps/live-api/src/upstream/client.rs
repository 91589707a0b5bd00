use std::time::Duration;

use async_trait::async_trait;
use lectern_common::stream::{
    StreamRequest, StreamResponse, GATEWAY_KEY_HEADER, START_STREAM_PATH, STOP_STREAM_PATH,
};

use super::{GatewayError, StreamStarted, StreamingGateway};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Calls the stream-api over HTTP.
#[derive(Clone)]
pub struct HttpStreamingGateway {
    base_url: String,
    gateway_secret: String,
    http: reqwest::Client,
}

impl HttpStreamingGateway {
    pub fn new(base_url: &str, gateway_secret: &str) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            gateway_secret: gateway_secret.to_string(),
            http,
        })
    }

    async fn call(
        &self,
        path: &str,
        session_id: &str,
        bearer: &str,
    ) -> Result<StreamResponse, GatewayError> {
        let resp = self
            .http
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(bearer)
            .header(GATEWAY_KEY_HEADER, &self.gateway_secret)
            .json(&StreamRequest {
                session_id: session_id.to_string(),
            })
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        let body: Option<StreamResponse> = serde_json::from_str(&text).ok();

        match body {
            Some(body) if status.is_success() && body.success => Ok(body),
            Some(body) => Err(GatewayError::Rejected {
                status: status.as_u16(),
                message: body
                    .message
                    .unwrap_or_else(|| "no message".to_string()),
            }),
            None if status.is_success() => Err(GatewayError::Malformed(text)),
            None => Err(GatewayError::Rejected {
                status: status.as_u16(),
                message: text,
            }),
        }
    }
}

#[async_trait]
impl StreamingGateway for HttpStreamingGateway {
    async fn start(&self, session_id: &str, bearer: &str) -> Result<StreamStarted, GatewayError> {
        let body = self.call(START_STREAM_PATH, session_id, bearer).await?;
        match (body.url, body.stream_key) {
            (Some(url), Some(stream_key)) => Ok(StreamStarted { url, stream_key }),
            _ => Err(GatewayError::Malformed(
                "start-stream response is missing url or streamKey".to_string(),
            )),
        }
    }

    async fn stop(&self, session_id: &str, bearer: &str) -> Result<(), GatewayError> {
        self.call(STOP_STREAM_PATH, session_id, bearer).await?;
        Ok(())
    }
}
