//! Audit Store
//!
//! Append-only log of expense state transitions. Rows are never updated or
//! deleted; appends share the caller's transaction with the conditional
//! update so one successful mutation means exactly one durable audit row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use std::fmt;
use std::str::FromStr;

use crate::domain::{DomainError, ExpenseStatus};

/// Audited actions. A closed set, disjoint from the status vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    Submit,
    Approve,
    Reject,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::Submit => "SUBMIT",
            AuditAction::Approve => "APPROVE",
            AuditAction::Reject => "REJECT",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(AuditAction::Create),
            "SUBMIT" => Ok(AuditAction::Submit),
            "APPROVE" => Ok(AuditAction::Approve),
            "REJECT" => Ok(AuditAction::Reject),
            other => Err(format!("unknown audit action: {other}")),
        }
    }
}

/// An audit row to be appended.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub expense_id: i64,
    pub actor_id: i64,
    pub action: AuditAction,
    pub before_status: Option<ExpenseStatus>,
    pub after_status: ExpenseStatus,
    pub note: Option<String>,
    pub trace_id: String,
    pub created_at: DateTime<Utc>,
}

impl NewAuditEntry {
    /// CREATE: nil -> DRAFT
    pub fn created(
        expense_id: i64,
        actor_id: i64,
        trace_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            expense_id,
            actor_id,
            action: AuditAction::Create,
            before_status: None,
            after_status: ExpenseStatus::Draft,
            note: None,
            trace_id: trace_id.into(),
            created_at: now,
        }
    }

    /// SUBMIT: DRAFT -> SUBMITTED
    pub fn submitted(
        expense_id: i64,
        actor_id: i64,
        trace_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            expense_id,
            actor_id,
            action: AuditAction::Submit,
            before_status: Some(ExpenseStatus::Draft),
            after_status: ExpenseStatus::Submitted,
            note: None,
            trace_id: trace_id.into(),
            created_at: now,
        }
    }

    /// APPROVE: SUBMITTED -> APPROVED
    pub fn approved(
        expense_id: i64,
        actor_id: i64,
        trace_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            expense_id,
            actor_id,
            action: AuditAction::Approve,
            before_status: Some(ExpenseStatus::Submitted),
            after_status: ExpenseStatus::Approved,
            note: None,
            trace_id: trace_id.into(),
            created_at: now,
        }
    }

    /// REJECT: SUBMITTED -> REJECTED, note carries the reason
    pub fn rejected(
        expense_id: i64,
        actor_id: i64,
        reason: impl Into<String>,
        trace_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            expense_id,
            actor_id,
            action: AuditAction::Reject,
            before_status: Some(ExpenseStatus::Submitted),
            after_status: ExpenseStatus::Rejected,
            note: Some(reason.into()),
            trace_id: trace_id.into(),
            created_at: now,
        }
    }
}

/// A persisted audit row.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub id: i64,
    pub expense_id: i64,
    pub actor_id: i64,
    pub action: AuditAction,
    pub before_status: Option<ExpenseStatus>,
    pub after_status: ExpenseStatus,
    pub note: Option<String>,
    pub trace_id: String,
    pub created_at: DateTime<Utc>,
}

type AuditRow = (
    i64,
    i64,
    i64,
    String,
    Option<String>,
    String,
    Option<String>,
    String,
    DateTime<Utc>,
);

/// Append-only audit log over PostgreSQL
#[derive(Debug, Clone)]
pub struct AuditStore {
    pool: PgPool,
}

impl AuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append one row inside the caller's transaction.
    pub async fn append(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        entry: &NewAuditEntry,
    ) -> Result<i64, DomainError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO expense_audit_logs
                (expense_id, actor_id, action, before_status, after_status,
                 note, trace_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(entry.expense_id)
        .bind(entry.actor_id)
        .bind(entry.action.as_str())
        .bind(entry.before_status.map(|s| s.as_str()))
        .bind(entry.after_status.as_str())
        .bind(&entry.note)
        .bind(&entry.trace_id)
        .bind(entry.created_at)
        .fetch_one(&mut **tx)
        .await?;

        tracing::debug!(
            audit_id = id,
            expense_id = entry.expense_id,
            action = %entry.action,
            trace_id = %entry.trace_id,
            "audit row appended"
        );

        Ok(id)
    }

    /// All rows for one expense in transition order.
    pub async fn find_by_expense(&self, expense_id: i64) -> Result<Vec<AuditEntry>, DomainError> {
        let rows: Vec<AuditRow> = sqlx::query_as(
            r#"
            SELECT id, expense_id, actor_id, action, before_status, after_status,
                   note, trace_id, created_at
            FROM expense_audit_logs
            WHERE expense_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(expense_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(map_row).collect()
    }
}

fn map_row(row: AuditRow) -> Result<AuditEntry, DomainError> {
    let (id, expense_id, actor_id, action, before_status, after_status, note, trace_id, created_at) =
        row;

    let corrupt = |e: String| DomainError::Storage {
        retryable: false,
        message: format!("audit row {id}: {e}"),
    };

    Ok(AuditEntry {
        id,
        expense_id,
        actor_id,
        action: action.parse().map_err(corrupt)?,
        before_status: before_status
            .map(|s| s.parse::<ExpenseStatus>())
            .transpose()
            .map_err(corrupt)?,
        after_status: after_status.parse().map_err(corrupt)?,
        note,
        trace_id,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_action_round_trip() {
        for action in [
            AuditAction::Create,
            AuditAction::Submit,
            AuditAction::Approve,
            AuditAction::Reject,
        ] {
            assert_eq!(action.as_str().parse::<AuditAction>().unwrap(), action);
        }
        // Statuses are not actions
        assert!("DRAFT".parse::<AuditAction>().is_err());
        assert!("SUBMITTED".parse::<AuditAction>().is_err());
    }

    #[test]
    fn test_entry_constructors_follow_legal_edges() {
        let now = Utc::now();

        let created = NewAuditEntry::created(1, 10, "t", now);
        assert_eq!(created.action, AuditAction::Create);
        assert_eq!(created.before_status, None);
        assert_eq!(created.after_status, ExpenseStatus::Draft);
        assert!(created.note.is_none());

        let submitted = NewAuditEntry::submitted(1, 10, "t", now);
        assert_eq!(
            (submitted.before_status, submitted.after_status),
            (Some(ExpenseStatus::Draft), ExpenseStatus::Submitted)
        );

        let approved = NewAuditEntry::approved(1, 20, "t", now);
        assert_eq!(approved.action, AuditAction::Approve);
        assert_eq!(
            (approved.before_status, approved.after_status),
            (Some(ExpenseStatus::Submitted), ExpenseStatus::Approved)
        );

        let rejected = NewAuditEntry::rejected(1, 20, "missing receipt", "t", now);
        assert_eq!(rejected.action, AuditAction::Reject);
        assert_eq!(rejected.note.as_deref(), Some("missing receipt"));
        assert_eq!(rejected.after_status, ExpenseStatus::Rejected);
    }
}
