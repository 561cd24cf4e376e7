//! Analytics Listener
//!
//! Records structured metrics lines for every committed transition. The
//! downstream analytics pipeline consumes these; the listener itself stays
//! fire-and-forget.

use async_trait::async_trait;

use crate::bus::{Subscriber, SubscriberError};
use crate::domain::{EventKind, ExpenseEvent};

#[derive(Debug, Clone, Default)]
pub struct AnalyticsListener;

#[async_trait]
impl Subscriber for AnalyticsListener {
    fn name(&self) -> &'static str {
        "analytics"
    }

    fn interests(&self) -> &'static [EventKind] {
        &[
            EventKind::Created,
            EventKind::Submitted,
            EventKind::Approved,
            EventKind::Rejected,
        ]
    }

    async fn handle(&self, event: &ExpenseEvent) -> Result<(), SubscriberError> {
        match event {
            ExpenseEvent::ExpenseCreated {
                expense_id,
                actor_id,
                trace_id,
                ..
            } => {
                tracing::info!(
                    target: "analytics",
                    metric = "expense.created",
                    expense_id,
                    actor_id,
                    trace_id = %trace_id,
                    "expense created"
                );
            }
            ExpenseEvent::ExpenseSubmitted {
                expense_id,
                applicant_id,
                trace_id,
                ..
            } => {
                tracing::info!(
                    target: "analytics",
                    metric = "expense.submitted",
                    expense_id,
                    applicant_id,
                    trace_id = %trace_id,
                    "expense submitted"
                );
            }
            ExpenseEvent::ExpenseApproved {
                expense_id,
                approver_id,
                trace_id,
                ..
            } => {
                tracing::info!(
                    target: "analytics",
                    metric = "expense.approved",
                    expense_id,
                    approver_id,
                    trace_id = %trace_id,
                    "expense approved"
                );
            }
            ExpenseEvent::ExpenseRejected {
                expense_id,
                rejector_id,
                trace_id,
                ..
            } => {
                tracing::info!(
                    target: "analytics",
                    metric = "expense.rejected",
                    expense_id,
                    rejector_id,
                    trace_id = %trace_id,
                    "expense rejected"
                );
            }
        }
        Ok(())
    }
}
