// Blog Feed - post feeds, follow graph, pagination and feed caching

// Domain model
pub mod models;

// Infrastructure - clock, IDs, cache, stores, viewer context
pub mod infrastructure;

// Feed, follow and post services
pub mod services;

// HTTP surface and application wiring
pub mod feed_interface;
pub mod app_state;
pub mod config;

// Common utilities
pub mod error;
pub mod data_seeder;

// Re-exports for convenience
pub use error::{AppError, AppResult};
