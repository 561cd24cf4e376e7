//! Reject Handler
//!
//! SUBMITTED -> REJECTED at a caller-supplied version. A rejection always
//! carries a reason; it lands in the audit note and the rejection event.

use chrono::Utc;
use sqlx::PgPool;

use crate::bus::{EventBuffer, EventBus};
use crate::domain::{
    AuthorizationPolicy, DomainError, Expense, ExpenseAction, ExpenseEvent, RequestContext,
};
use crate::store::{AuditStore, ExpenseStore, NewAuditEntry, UpdateOutcome};

use super::RejectExpenseCommand;

/// Maximum rejection reason length in characters
const MAX_REASON_LEN: usize = 100;

pub struct RejectExpenseHandler {
    store: ExpenseStore,
    audit: AuditStore,
    policy: AuthorizationPolicy,
    bus: EventBus,
    pool: PgPool,
}

impl RejectExpenseHandler {
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
        command: RejectExpenseCommand,
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
            .authorize(ctx, &current, ExpenseAction::Reject)?;

        let reason = validate_reason(&command.reason)?;

        // Stale revision: conflict before the transition check, as in approve
        if command.expected_version != current.version() {
            return Err(DomainError::Conflict {
                expense_id,
                expected_version: command.expected_version,
            });
        }

        // InvalidTransition here when the pre-read is not SUBMITTED
        let post = current.reject(now)?;

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
                        &NewAuditEntry::rejected(
                            expense_id,
                            ctx.actor_id(),
                            reason.clone(),
                            ctx.trace_id(),
                            now,
                        ),
                    )
                    .await?;

                let mut buffer = EventBuffer::new();
                buffer.record(ExpenseEvent::ExpenseRejected {
                    expense_id,
                    rejector_id: ctx.actor_id(),
                    applicant_id: current.applicant_id(),
                    reason,
                    trace_id: ctx.trace_id().to_string(),
                    occurred_at: now,
                });

                tx.commit().await.map_err(DomainError::from)?;
                buffer.flush(&self.bus).await;

                tracing::info!(
                    expense_id,
                    rejector_id = ctx.actor_id(),
                    version = post.version(),
                    trace_id = ctx.trace_id(),
                    "expense rejected"
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

fn validate_reason(reason: &str) -> Result<String, DomainError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(DomainError::validation("reason", "must not be blank"));
    }
    if reason.chars().count() > MAX_REASON_LEN {
        return Err(DomainError::validation(
            "reason",
            format!("must be at most {MAX_REASON_LEN} characters"),
        ));
    }
    Ok(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FieldError;

    #[test]
    fn test_reason_required() {
        let err = validate_reason("   ").unwrap_err();
        assert_eq!(
            err,
            DomainError::Validation {
                details: vec![FieldError::new("reason", "must not be blank")],
            }
        );
    }

    #[test]
    fn test_reason_length_limit() {
        assert!(validate_reason(&"x".repeat(100)).is_ok());
        assert!(validate_reason(&"x".repeat(101)).is_err());
    }

    #[test]
    fn test_reason_trimmed() {
        assert_eq!(validate_reason("  missing receipt  ").unwrap(), "missing receipt");
    }
}
