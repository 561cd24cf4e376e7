//! Audit Log Handler
//!
//! Read path for an expense's transition history, gated by the VIEW rule.

use sqlx::PgPool;

use crate::domain::{AuthorizationPolicy, DomainError, ExpenseAction, RequestContext};
use crate::store::{AuditEntry, AuditStore, ExpenseStore};

pub struct AuditLogHandler {
    store: ExpenseStore,
    audit: AuditStore,
    policy: AuthorizationPolicy,
}

impl AuditLogHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            store: ExpenseStore::new(pool.clone()),
            audit: AuditStore::new(pool),
            policy: AuthorizationPolicy,
        }
    }

    /// All audit rows for one expense in transition order, visible to the
    /// applicant, approvers and admins.
    pub async fn execute(
        &self,
        expense_id: i64,
        ctx: &RequestContext,
    ) -> Result<Vec<AuditEntry>, DomainError> {
        let expense = self
            .store
            .find_by_id(expense_id)
            .await?
            .ok_or(DomainError::NotFound { expense_id })?;

        self.policy.authorize(ctx, &expense, ExpenseAction::View)?;

        self.audit.find_by_expense(expense_id).await
    }
}
