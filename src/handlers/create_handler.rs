//! Create Handler
//!
//! Persists a new draft expense with its CREATE audit row in one
//! transaction, then publishes `ExpenseCreated`.

use chrono::Utc;
use sqlx::PgPool;

use crate::bus::{EventBuffer, EventBus};
use crate::domain::{DomainError, Expense, ExpenseEvent, NewExpense, RequestContext};
use crate::store::{AuditStore, ExpenseStore, NewAuditEntry};

use super::CreateExpenseCommand;

pub struct CreateExpenseHandler {
    store: ExpenseStore,
    audit: AuditStore,
    bus: EventBus,
    pool: PgPool,
}

impl CreateExpenseHandler {
    pub fn new(pool: PgPool, bus: EventBus) -> Self {
        Self {
            store: ExpenseStore::new(pool.clone()),
            audit: AuditStore::new(pool.clone()),
            bus,
            pool,
        }
    }

    /// Execute the create command. Any authenticated actor may create;
    /// the context itself is the proof of authentication.
    pub async fn execute(
        &self,
        command: CreateExpenseCommand,
        ctx: &RequestContext,
    ) -> Result<Expense, DomainError> {
        let now = Utc::now();

        let draft = NewExpense::new(
            ctx.actor_id(),
            &command.title,
            command.amount,
            command.currency.as_deref(),
            now,
        )?;

        let mut tx = self.pool.begin().await.map_err(DomainError::from)?;

        let expense = self.store.insert(&mut tx, draft).await?;
        self.audit
            .append(
                &mut tx,
                &NewAuditEntry::created(expense.id(), ctx.actor_id(), ctx.trace_id(), now),
            )
            .await?;

        let mut buffer = EventBuffer::new();
        buffer.record(ExpenseEvent::ExpenseCreated {
            expense_id: expense.id(),
            actor_id: ctx.actor_id(),
            trace_id: ctx.trace_id().to_string(),
            occurred_at: now,
        });

        tx.commit().await.map_err(DomainError::from)?;
        buffer.flush(&self.bus).await;

        tracing::info!(
            expense_id = expense.id(),
            applicant_id = ctx.actor_id(),
            trace_id = ctx.trace_id(),
            "expense draft created"
        );

        Ok(expense)
    }
}
