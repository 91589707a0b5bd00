pub mod health;
pub mod stream;

use axum::Router;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(stream::router())
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
            components.add_security_scheme(
                "gateway_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(
                    lectern_common::stream::GATEWAY_KEY_HEADER,
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        stream::start_stream,
        stream::stop_stream,
        stream::list_active,
    ),
    components(
        schemas(
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            crate::encoder::ActiveEncode,
            lectern_common::stream::StreamRequest,
            lectern_common::stream::StreamResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Stream", description = "Encoder start/stop for live sessions"),
    )
)]
pub struct ApiDoc;
