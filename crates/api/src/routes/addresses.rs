//! Tracked address routes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use burstwatch_common::error::AppError;
use burstwatch_common::types::TrackedAddress;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/addresses", get(list_addresses).post(add_address))
}

#[derive(Debug, Deserialize)]
pub struct AddAddressParams {
    pub address: String,
    #[serde(default)]
    pub description: String,
}

/// GET /api/addresses: All tracked addresses and their labels.
async fn list_addresses(State(state): State<AppState>) -> Json<Vec<TrackedAddress>> {
    Json(state.registry.entries())
}

/// POST /api/addresses: Start tracking an address.
///
/// The address is validated and stored lowercase; the next tick picks it up.
async fn add_address(
    State(state): State<AppState>,
    Json(params): Json<AddAddressParams>,
) -> Result<(StatusCode, Json<TrackedAddress>), AppError> {
    let registry = state.registry.clone();
    let tracked = tokio::task::spawn_blocking(move || {
        registry.register(&params.address, &params.description)
    })
    .await
    .map_err(|e| AppError::Internal(format!("Registry task failed: {e}")))??;

    Ok((StatusCode::CREATED, Json(tracked)))
}
