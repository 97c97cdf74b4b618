pub mod addresses;
pub mod health;
pub mod status;

use axum::Router;

use crate::state::AppState;

/// Build the complete API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(status::router())
        .merge(addresses::router())
        .with_state(state)
}
