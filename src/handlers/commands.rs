//! Command definitions
//!
//! Commands represent intentions to change the expense lifecycle state.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Command to create a draft expense
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateExpenseCommand {
    pub title: String,
    /// Raw amount; validated into a domain `Amount` by the handler
    pub amount: Decimal,
    /// Optional 3-letter currency code; defaults to JPY
    pub currency: Option<String>,
}

impl CreateExpenseCommand {
    pub fn new(title: String, amount: Decimal) -> Self {
        Self {
            title,
            amount,
            currency: None,
        }
    }

    pub fn with_currency(mut self, currency: String) -> Self {
        self.currency = Some(currency);
        self
    }
}

/// Command to submit a draft for approval
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SubmitExpenseCommand {
    pub expense_id: i64,
}

impl SubmitExpenseCommand {
    pub fn new(expense_id: i64) -> Self {
        Self { expense_id }
    }
}

/// Command to approve a submitted expense at a known version
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ApproveExpenseCommand {
    pub expense_id: i64,
    /// The version the approver last observed; the concurrency token
    pub expected_version: i32,
}

impl ApproveExpenseCommand {
    pub fn new(expense_id: i64, expected_version: i32) -> Self {
        Self {
            expense_id,
            expected_version,
        }
    }
}

/// Command to reject a submitted expense at a known version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectExpenseCommand {
    pub expense_id: i64,
    pub expected_version: i32,
    /// Required; recorded in the audit note and the rejection event
    pub reason: String,
}

impl RejectExpenseCommand {
    pub fn new(expense_id: i64, expected_version: i32, reason: String) -> Self {
        Self {
            expense_id,
            expected_version,
            reason,
        }
    }
}
