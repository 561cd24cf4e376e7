//! Submit Handler
//!
//! DRAFT -> SUBMITTED. Correctness rests on the version-predicated update;
//! the pre-read only produces friendly error classification and the
//! post-image.

use chrono::Utc;
use sqlx::PgPool;

use crate::bus::{EventBuffer, EventBus};
use crate::domain::{
    AuthorizationPolicy, DomainError, Expense, ExpenseAction, ExpenseEvent, ExpenseStatus,
    RequestContext,
};
use crate::store::{AuditStore, ExpenseStore, NewAuditEntry, UpdateOutcome};

use super::SubmitExpenseCommand;

pub struct SubmitExpenseHandler {
    store: ExpenseStore,
    audit: AuditStore,
    policy: AuthorizationPolicy,
    bus: EventBus,
    pool: PgPool,
}

impl SubmitExpenseHandler {
    pub fn new(pool: PgPool, bus: EventBus) -> Self {
        Self {
            store: ExpenseStore::new(pool.clone()),
            audit: AuditStore::new(pool.clone()),
            policy: AuthorizationPolicy,
            bus,
            pool,
        }
    }

    pub async fn execute(
        &self,
        command: SubmitExpenseCommand,
        ctx: &RequestContext,
    ) -> Result<Expense, DomainError> {
        let expense_id = command.expense_id;
        let now = Utc::now();

        let current = self
            .store
            .find_by_id(expense_id)
            .await?
            .ok_or(DomainError::NotFound { expense_id })?;

        self.policy
            .authorize(ctx, &current, ExpenseAction::Submit)?;

        // InvalidTransition here when the pre-read is not a draft
        let post = current.submit(now)?;

        let mut tx = self.pool.begin().await.map_err(DomainError::from)?;

        match self
            .store
            .conditional_update(&mut tx, expense_id, current.version(), &post)
            .await?
        {
            UpdateOutcome::Applied => {
                self.audit
                    .append(
                        &mut tx,
                        &NewAuditEntry::submitted(expense_id, ctx.actor_id(), ctx.trace_id(), now),
                    )
                    .await?;

                let mut buffer = EventBuffer::new();
                buffer.record(ExpenseEvent::ExpenseSubmitted {
                    expense_id,
                    applicant_id: post.applicant_id(),
                    trace_id: ctx.trace_id().to_string(),
                    occurred_at: now,
                });

                tx.commit().await.map_err(DomainError::from)?;
                buffer.flush(&self.bus).await;

                tracing::info!(
                    expense_id,
                    applicant_id = post.applicant_id(),
                    version = post.version(),
                    trace_id = ctx.trace_id(),
                    "expense submitted"
                );

                Ok(post)
            }
            UpdateOutcome::VersionMismatch => {
                tx.rollback().await.map_err(DomainError::from)?;
                Err(self.classify_mismatch(expense_id, current.version()).await?)
            }
        }
    }

    /// A failed predicate means someone else committed between our pre-read
    /// and the update. Re-read to tell a racing submit (the draft is gone,
    /// the transition is now illegal) from a plain version collision.
    async fn classify_mismatch(
        &self,
        expense_id: i64,
        expected_version: i32,
    ) -> Result<DomainError, DomainError> {
        let fresh = self.store.find_by_id(expense_id).await?;

        Ok(match fresh {
            None => DomainError::NotFound { expense_id },
            Some(f) if f.status() != ExpenseStatus::Draft => DomainError::InvalidTransition {
                status: f.status(),
                action: ExpenseAction::Submit,
            },
            Some(_) => DomainError::Conflict {
                expense_id,
                expected_version,
            },
        })
    }
}
