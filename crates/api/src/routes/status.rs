//! Monitoring status routes.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use burstwatch_common::address::canonicalize;
use burstwatch_common::error::AppError;
use burstwatch_common::types::WalletState;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/status", get(list_status))
        .route("/api/status/{address}", get(get_status))
}

/// A tracked address with its current burst state.
#[derive(Debug, Serialize)]
pub struct AddressStatus {
    pub address: String,
    pub label: String,
    /// `None` until the address has been observed by a tick.
    pub state: Option<WalletState>,
}

/// GET /api/status: Every tracked address with its wallet state.
async fn list_status(State(state): State<AppState>) -> Json<Vec<AddressStatus>> {
    let mut states = state.states.all();
    let statuses = state
        .registry
        .entries()
        .into_iter()
        .map(|entry| AddressStatus {
            state: states.remove(&entry.address),
            address: entry.address,
            label: entry.label,
        })
        .collect();
    Json(statuses)
}

/// GET /api/status/:address: State of a single tracked address.
async fn get_status(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<AddressStatus>, AppError> {
    let address = canonicalize(&address)?;
    let label = state
        .registry
        .label(&address)
        .ok_or_else(|| AppError::NotFound(format!("Address {} is not tracked", address)))?;

    Ok(Json(AddressStatus {
        state: state.states.get(&address),
        address,
        label,
    }))
}
