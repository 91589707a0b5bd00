//! Service-to-service credential extraction.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use lectern_common::stream::GATEWAY_KEY_HEADER;

use crate::error::ApiError;
use crate::AppState;

/// A caller that presented a bearer token and the shared gateway key.
///
/// The bearer token is forwarded from the original request and is not
/// validated here; identity is established by the calling service.
#[derive(Debug, Clone)]
pub struct ServiceCaller {
    pub bearer: String,
}

impl FromRequestParts<AppState> for ServiceCaller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

        let bearer = header
            .strip_prefix("Bearer ")
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ApiError::unauthorized("Invalid Authorization header format"))?;

        let key = parts
            .headers
            .get(GATEWAY_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Missing gateway key"))?;

        if key != state.config.gateway_secret {
            tracing::warn!("rejected stream request with wrong gateway key");
            return Err(ApiError::unauthorized("Invalid gateway key"));
        }

        Ok(ServiceCaller {
            bearer: bearer.to_string(),
        })
    }
}
