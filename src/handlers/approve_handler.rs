//! Approve Handler
//!
//! SUBMITTED -> APPROVED at a caller-supplied version. The caller's
//! `expected_version` must match the pre-read before anything is written;
//! the version predicate settles races at commit.

use chrono::Utc;
use sqlx::PgPool;

use crate::bus::{EventBuffer, EventBus};
use crate::domain::{
    AuthorizationPolicy, DomainError, Expense, ExpenseAction, ExpenseEvent, RequestContext,
};
use crate::store::{AuditStore, ExpenseStore, NewAuditEntry, UpdateOutcome};

use super::ApproveExpenseCommand;

pub struct ApproveExpenseHandler {
    store: ExpenseStore,
    audit: AuditStore,
    policy: AuthorizationPolicy,
    bus: EventBus,
    pool: PgPool,
}

impl ApproveExpenseHandler {
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
        command: ApproveExpenseCommand,
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
            .authorize(ctx, &current, ExpenseAction::Approve)?;

        // The approver decided on a stale revision: conflict, nothing
        // written. Checked before the transition so a racing approval
        // surfaces as a conflict, not as an illegal transition.
        if command.expected_version != current.version() {
            return Err(DomainError::Conflict {
                expense_id,
                expected_version: command.expected_version,
            });
        }

        // InvalidTransition here when the pre-read is not SUBMITTED
        let post = current.approve(now)?;

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
                        &NewAuditEntry::approved(expense_id, ctx.actor_id(), ctx.trace_id(), now),
                    )
                    .await?;

                let mut buffer = EventBuffer::new();
                buffer.record(ExpenseEvent::ExpenseApproved {
                    expense_id,
                    approver_id: ctx.actor_id(),
                    applicant_id: current.applicant_id(),
                    trace_id: ctx.trace_id().to_string(),
                    occurred_at: now,
                });

                tx.commit().await.map_err(DomainError::from)?;
                buffer.flush(&self.bus).await;

                tracing::info!(
                    expense_id,
                    approver_id = ctx.actor_id(),
                    version = post.version(),
                    trace_id = ctx.trace_id(),
                    "expense approved"
                );

                Ok(post)
            }
            UpdateOutcome::VersionMismatch => {
                tx.rollback().await.map_err(DomainError::from)?;
                Err(DomainError::Conflict {
                    expense_id,
                    expected_version: command.expected_version,
                })
            }
        }
    }
}
