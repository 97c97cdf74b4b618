pub mod classifier;
pub mod processor;
pub mod registry;
pub mod state;
