// Library entry point for confesshub
// Exposes modules for testing

pub mod api;
pub mod auth;
pub mod engine;
pub mod models;
pub mod store;
