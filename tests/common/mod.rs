//! Common test utilities

use axum::{middleware, Router};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use expense_flow::api::{self, AppState};
use expense_flow::bus::{EventBus, EventBusConfig};

/// Seeded actors
pub const USER_A: i64 = 10;
pub const USER_B: i64 = 11;
pub const APPROVER_X: i64 = 20;
pub const APPROVER_Y: i64 = 21;
pub const ADMIN: i64 = 30;

/// Setup test database - truncate tables and seed test users
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    let mut tx = pool.begin().await.expect("Failed to begin transaction");

    // Clean up DB for fresh state
    sqlx::query("TRUNCATE TABLE expense_audit_logs, expenses, user_roles, users RESTART IDENTITY CASCADE")
        .execute(&mut *tx)
        .await
        .expect("Failed to clean up DB");

    sqlx::query(
        r#"
        INSERT INTO users (id, email, display_name) VALUES
            ($1, 'user-a@example.com', 'User A'),
            ($2, 'user-b@example.com', 'User B'),
            ($3, 'approver-x@example.com', 'Approver X'),
            ($4, 'approver-y@example.com', 'Approver Y'),
            ($5, 'admin@example.com', 'Admin')
        "#,
    )
    .bind(USER_A)
    .bind(USER_B)
    .bind(APPROVER_X)
    .bind(APPROVER_Y)
    .bind(ADMIN)
    .execute(&mut *tx)
    .await
    .expect("Failed to seed users");

    sqlx::query(
        r#"
        INSERT INTO user_roles (user_id, role) VALUES
            ($1, 'ROLE_APPLICANT'),
            ($2, 'ROLE_APPLICANT'),
            ($3, 'ROLE_APPROVER'),
            ($4, 'ROLE_APPROVER'),
            ($5, 'ROLE_ADMIN')
        "#,
    )
    .bind(USER_A)
    .bind(USER_B)
    .bind(APPROVER_X)
    .bind(APPROVER_Y)
    .bind(ADMIN)
    .execute(&mut *tx)
    .await
    .expect("Failed to seed roles");

    tx.commit().await.expect("Failed to commit transaction");

    pool
}

/// Event bus with no subscribers, for exercising handlers in isolation
pub fn quiet_bus() -> EventBus {
    EventBus::builder(EventBusConfig::default()).build()
}

/// The application router with the same middleware stack as the binary
pub fn test_app(pool: PgPool) -> Router {
    let state = AppState::new(pool, quiet_bus());

    api::create_router()
        .layer(middleware::from_fn(api::middleware::context_middleware))
        .layer(middleware::from_fn(api::middleware::trace_middleware))
        .with_state(state)
}
