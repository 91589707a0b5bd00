pub mod health;
pub mod live;

use axum::Router;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(crate::channel::server::router())
        .merge(live::router())
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        live::create_session,
        live::list_sessions,
        live::get_session,
        live::change_status,
        live::check_can_start,
        live::room_viewers,
    ),
    components(
        schemas(
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            crate::error::FieldError,
            crate::models::live_session::LiveStatus,
            crate::models::live_session::LiveSession,
            crate::models::live_session::Attendee,
            live::CreateLiveSessionRequest,
            live::UpdateStatusRequest,
            live::LiveSessionDetail,
            live::CanStartResponse,
            live::ViewerCountResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Live", description = "Live session scheduling and lifecycle"),
    )
)]
pub struct ApiDoc;
