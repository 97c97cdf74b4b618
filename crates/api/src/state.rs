//! Shared application state for the Axum API server.

use burstwatch_engine::registry::AddressRegistry;
use burstwatch_engine::state::WalletStateStore;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub registry: AddressRegistry,
    pub states: WalletStateStore,
}

impl AppState {
    pub fn new(registry: AddressRegistry, states: WalletStateStore) -> Self {
        Self { registry, states }
    }
}
