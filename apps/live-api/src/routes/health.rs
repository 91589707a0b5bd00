use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::config::StoreKind;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let store = match state.config.store {
        StoreKind::Postgres => "postgres",
        StoreKind::Memory => "memory",
    };
    Json(serde_json::json!({ "status": "ok", "store": store }))
}
