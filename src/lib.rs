// Public API for integration tests and potential library usage

pub mod abuse;
pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod policy;
pub mod protocol;
pub mod questions;
pub mod room;
pub mod state;
pub mod types;
pub mod ws;

// Re-export broadcast for testing
pub mod broadcast;
