use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use lectern_common::stream::StreamResponse;
use serde::Serialize;
use utoipa::ToSchema;

use crate::encoder::EncoderError;

/// Body of credential and input errors.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

/// Failure of a stream endpoint.
///
/// Request problems answer with [`ApiErrorBody`]. Encoder failures answer with
/// a `StreamResponse` whose `success` is false, so every reply from a running
/// encoder endpoint parses as the gateway contract.
#[derive(Debug)]
pub enum ApiError {
    Request {
        status: StatusCode,
        code: &'static str,
        message: String,
    },
    Encoder(EncoderError),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::Request {
            status: StatusCode::BAD_REQUEST,
            code: "BAD_REQUEST",
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Request {
            status: StatusCode::UNAUTHORIZED,
            code: "UNAUTHORIZED",
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Request { status, .. } => *status,
            ApiError::Encoder(EncoderError::AlreadyEncoding(_)) => StatusCode::CONFLICT,
            ApiError::Encoder(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<EncoderError> for ApiError {
    fn from(err: EncoderError) -> Self {
        ApiError::Encoder(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::Request { code, message, .. } => {
                let body = ApiErrorBody {
                    error: ApiErrorDetail {
                        code: code.to_string(),
                        message,
                    },
                };
                (status, Json(body)).into_response()
            }
            ApiError::Encoder(err) => {
                if status.is_server_error() {
                    tracing::error!(error = %err, "encoder request failed");
                } else {
                    tracing::warn!(error = %err, "encoder request refused");
                }
                (status, Json(StreamResponse::failed(err.to_string()))).into_response()
            }
        }
    }
}
