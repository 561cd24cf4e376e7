//! Domain Events
//!
//! Events describing committed expense transitions. They are values: once
//! published they outlive the transaction that produced them, and carry
//! everything a subscriber needs without a read-back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event type discriminator used for subscriber registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Created,
    Submitted,
    Approved,
    Rejected,
}

/// A committed expense transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExpenseEvent {
    /// A draft was created
    ExpenseCreated {
        expense_id: i64,
        actor_id: i64,
        trace_id: String,
        occurred_at: DateTime<Utc>,
    },

    /// A draft was submitted for approval
    ExpenseSubmitted {
        expense_id: i64,
        applicant_id: i64,
        trace_id: String,
        occurred_at: DateTime<Utc>,
    },

    /// A submitted expense was approved
    ExpenseApproved {
        expense_id: i64,
        approver_id: i64,
        applicant_id: i64,
        trace_id: String,
        occurred_at: DateTime<Utc>,
    },

    /// A submitted expense was rejected
    ExpenseRejected {
        expense_id: i64,
        rejector_id: i64,
        applicant_id: i64,
        reason: String,
        trace_id: String,
        occurred_at: DateTime<Utc>,
    },
}

impl ExpenseEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            ExpenseEvent::ExpenseCreated { .. } => "ExpenseCreated",
            ExpenseEvent::ExpenseSubmitted { .. } => "ExpenseSubmitted",
            ExpenseEvent::ExpenseApproved { .. } => "ExpenseApproved",
            ExpenseEvent::ExpenseRejected { .. } => "ExpenseRejected",
        }
    }

    /// Discriminator for exact-match subscriber registration
    pub fn kind(&self) -> EventKind {
        match self {
            ExpenseEvent::ExpenseCreated { .. } => EventKind::Created,
            ExpenseEvent::ExpenseSubmitted { .. } => EventKind::Submitted,
            ExpenseEvent::ExpenseApproved { .. } => EventKind::Approved,
            ExpenseEvent::ExpenseRejected { .. } => EventKind::Rejected,
        }
    }

    /// Get the expense this event relates to
    pub fn expense_id(&self) -> i64 {
        match self {
            ExpenseEvent::ExpenseCreated { expense_id, .. }
            | ExpenseEvent::ExpenseSubmitted { expense_id, .. }
            | ExpenseEvent::ExpenseApproved { expense_id, .. }
            | ExpenseEvent::ExpenseRejected { expense_id, .. } => *expense_id,
        }
    }

    /// Correlation id of the originating request
    pub fn trace_id(&self) -> &str {
        match self {
            ExpenseEvent::ExpenseCreated { trace_id, .. }
            | ExpenseEvent::ExpenseSubmitted { trace_id, .. }
            | ExpenseEvent::ExpenseApproved { trace_id, .. }
            | ExpenseEvent::ExpenseRejected { trace_id, .. } => trace_id,
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ExpenseEvent::ExpenseCreated { occurred_at, .. }
            | ExpenseEvent::ExpenseSubmitted { occurred_at, .. }
            | ExpenseEvent::ExpenseApproved { occurred_at, .. }
            | ExpenseEvent::ExpenseRejected { occurred_at, .. } => *occurred_at,
        }
    }
}
