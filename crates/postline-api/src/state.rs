//! Application state.

use postline_scheduler::Scheduler;
use sqlx::PgPool;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub scheduler: Arc<Scheduler>,
}

impl AppState {
    pub fn new(pool: PgPool, scheduler: Arc<Scheduler>) -> Self {
        Self { pool, scheduler }
    }
}
