//! HTTP API server for Postline.
//!
//! Exposes the schedule and cancel endpoints and wires the background
//! runners that execute due publishes.

pub mod error;
pub mod identity;
pub mod routes;
pub mod state;

pub use state::AppState;
