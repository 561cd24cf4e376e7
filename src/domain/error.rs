//! Domain Error Types
//!
//! The error taxonomy of the expense lifecycle. Each kind is a distinct
//! variant so callers can match exhaustively; kinds are never conflated.

use thiserror::Error;

use super::expense::ExpenseStatus;
use super::policy::ExpenseAction;

/// A single invalid field in a validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Categorical failures of the expense lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// One or more request fields failed validation
    #[error("validation failed: {}", describe_fields(.details))]
    Validation { details: Vec<FieldError> },

    /// No resolved actor identity on the request
    #[error("request is not authenticated")]
    Unauthenticated,

    /// The actor is not allowed to perform the action
    #[error("not authorized to {action}: {reason}")]
    Unauthorized {
        action: ExpenseAction,
        reason: String,
    },

    /// Expense does not exist
    #[error("expense not found: {expense_id}")]
    NotFound { expense_id: i64 },

    /// The expense is not in a state from which the action is legal
    #[error("cannot {action} an expense in status {status}")]
    InvalidTransition {
        status: ExpenseStatus,
        action: ExpenseAction,
    },

    /// Version predicate failed: someone else committed first
    #[error("expense {expense_id} was modified concurrently (expected version {expected_version})")]
    Conflict {
        expense_id: i64,
        expected_version: i32,
    },

    /// Store I/O fault; `retryable` marks transient conditions
    #[error("storage error: {message}")]
    Storage { retryable: bool, message: String },
}

impl DomainError {
    /// Single-field validation failure.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            details: vec![FieldError::new(field, message)],
        }
    }

    /// Check if this error is a concurrency conflict (safe to retry after a
    /// fresh read).
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Check if this is a transient storage fault.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage { retryable: true, .. })
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        let retryable = match &err {
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut => true,
            sqlx::Error::Database(db) => {
                // serialization_failure / deadlock_detected
                matches!(db.code().as_deref(), Some("40001") | Some("40P01"))
            }
            _ => false,
        };
        Self::Storage {
            retryable,
            message: err.to_string(),
        }
    }
}

fn describe_fields(details: &[FieldError]) -> String {
    details
        .iter()
        .map(|d| d.field.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
