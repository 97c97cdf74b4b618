//! Liveness endpoint with a short monitoring summary.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "burstwatch",
        "version": env!("CARGO_PKG_VERSION"),
        "tracked_addresses": state.registry.len(),
        "bursting": state.states.bursting().len()
    }))
}
