//! HTTP command surface: status queries and address registration.

pub mod routes;
pub mod state;
