pub mod address;
pub mod config;
pub mod error;
pub mod types;
