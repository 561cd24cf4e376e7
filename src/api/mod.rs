//! API module
//!
//! HTTP surface: routes and middleware.

pub mod middleware;
pub mod routes;

use sqlx::PgPool;

use crate::bus::EventBus;

pub use routes::create_router;

/// Shared state handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub bus: EventBus,
}

impl AppState {
    pub fn new(pool: PgPool, bus: EventBus) -> Self {
        Self { pool, bus }
    }
}
