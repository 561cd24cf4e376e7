//! User Directory
//!
//! Read-only lookup of contact addresses for notification delivery. The
//! directory never participates in lifecycle transactions; a stale or
//! missing address only delays a mail, it cannot violate an invariant.

use sqlx::PgPool;

use crate::domain::{DomainError, Role};

#[derive(Debug, Clone)]
pub struct UserDirectory {
    pool: PgPool,
}

impl UserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Mail address of an applicant.
    pub async fn email_of_applicant(&self, user_id: i64) -> Result<Option<String>, DomainError> {
        let email: Option<String> =
            sqlx::query_scalar("SELECT email FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(email)
    }

    /// Mail address of any approver, for submitted-expense notifications.
    pub async fn any_approver_email(&self) -> Result<Option<String>, DomainError> {
        let email: Option<String> = sqlx::query_scalar(
            r#"
            SELECT u.email
            FROM users u
            JOIN user_roles r ON r.user_id = u.id
            WHERE r.role = $1
            ORDER BY u.id
            LIMIT 1
            "#,
        )
        .bind(Role::Approver.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(email)
    }
}
