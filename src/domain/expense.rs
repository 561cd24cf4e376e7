//! Expense Aggregate
//!
//! Expense is the aggregate root of the approval workflow. The struct owns
//! its status and version; transitions are only reachable through the
//! methods below, each of which returns the complete post-image to persist.
//!
//! Legal transitions: DRAFT -> SUBMITTED -> {APPROVED, REJECTED}.
//! APPROVED and REJECTED are terminal.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::{DomainError, FieldError};
use super::money::{Amount, Currency};
use super::policy::ExpenseAction;

/// Maximum title length in characters
const MAX_TITLE_LEN: usize = 100;

/// Workflow status of an expense
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpenseStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
}

impl ExpenseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseStatus::Draft => "DRAFT",
            ExpenseStatus::Submitted => "SUBMITTED",
            ExpenseStatus::Approved => "APPROVED",
            ExpenseStatus::Rejected => "REJECTED",
        }
    }

    /// Terminal statuses accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExpenseStatus::Approved | ExpenseStatus::Rejected)
    }
}

impl fmt::Display for ExpenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpenseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(ExpenseStatus::Draft),
            "SUBMITTED" => Ok(ExpenseStatus::Submitted),
            "APPROVED" => Ok(ExpenseStatus::Approved),
            "REJECTED" => Ok(ExpenseStatus::Rejected),
            other => Err(format!("unknown expense status: {other}")),
        }
    }
}

/// A draft expense that has not been persisted yet.
///
/// Ids are assigned by the store on first insert; until then the draft is a
/// plain value. Status is implicitly DRAFT and version 0.
#[derive(Debug, Clone)]
pub struct NewExpense {
    applicant_id: i64,
    title: String,
    amount: Amount,
    currency: Currency,
    created_at: DateTime<Utc>,
}

impl NewExpense {
    /// Validate inputs and construct a draft.
    ///
    /// All failing fields are reported together in one
    /// [`DomainError::Validation`].
    pub fn new(
        applicant_id: i64,
        title: &str,
        amount: Decimal,
        currency: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let mut details = Vec::new();

        let title = title.trim();
        if title.is_empty() {
            details.push(FieldError::new("title", "must not be blank"));
        } else if title.chars().count() > MAX_TITLE_LEN {
            details.push(FieldError::new(
                "title",
                format!("must be at most {MAX_TITLE_LEN} characters"),
            ));
        }

        let amount = match Amount::new(amount) {
            Ok(a) => Some(a),
            Err(e) => {
                details.push(FieldError::new("amount", e.to_string()));
                None
            }
        };

        let currency = match currency {
            None => Some(Currency::jpy()),
            Some(code) => match Currency::new(code) {
                Ok(c) => Some(c),
                Err(e) => {
                    details.push(FieldError::new("currency", e.to_string()));
                    None
                }
            },
        };

        match (amount, currency) {
            (Some(amount), Some(currency)) if details.is_empty() => Ok(Self {
                applicant_id,
                title: title.to_string(),
                amount,
                currency,
                created_at: now,
            }),
            _ => Err(DomainError::Validation { details }),
        }
    }

    pub fn applicant_id(&self) -> i64 {
        self.applicant_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// A persisted expense.
#[derive(Debug, Clone, PartialEq)]
pub struct Expense {
    id: i64,
    applicant_id: i64,
    title: String,
    amount: Amount,
    currency: Currency,
    status: ExpenseStatus,
    submitted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i32,
}

impl Expense {
    /// Rebuild an expense from its persisted row. Store use only.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn restore(
        id: i64,
        applicant_id: i64,
        title: String,
        amount: Amount,
        currency: Currency,
        status: ExpenseStatus,
        submitted_at: Option<DateTime<Utc>>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        version: i32,
    ) -> Self {
        Self {
            id,
            applicant_id,
            title,
            amount,
            currency,
            status,
            submitted_at,
            created_at,
            updated_at,
            version,
        }
    }

    /// The persisted form of a freshly inserted draft.
    pub(crate) fn from_inserted(draft: NewExpense, id: i64) -> Self {
        Self {
            id,
            applicant_id: draft.applicant_id,
            title: draft.title,
            amount: draft.amount,
            currency: draft.currency,
            status: ExpenseStatus::Draft,
            submitted_at: None,
            created_at: draft.created_at,
            updated_at: draft.created_at,
            version: 0,
        }
    }

    /// Post-image for DRAFT -> SUBMITTED.
    pub fn submit(&self, now: DateTime<Utc>) -> Result<Expense, DomainError> {
        if !self.can_be_submitted() {
            return Err(DomainError::InvalidTransition {
                status: self.status,
                action: ExpenseAction::Submit,
            });
        }
        let mut next = self.clone();
        next.status = ExpenseStatus::Submitted;
        next.submitted_at = Some(now);
        next.updated_at = now;
        next.version = self.version + 1;
        Ok(next)
    }

    /// Post-image for SUBMITTED -> APPROVED.
    pub fn approve(&self, now: DateTime<Utc>) -> Result<Expense, DomainError> {
        if !self.can_be_approved() {
            return Err(DomainError::InvalidTransition {
                status: self.status,
                action: ExpenseAction::Approve,
            });
        }
        let mut next = self.clone();
        next.status = ExpenseStatus::Approved;
        next.updated_at = now;
        next.version = self.version + 1;
        Ok(next)
    }

    /// Post-image for SUBMITTED -> REJECTED.
    pub fn reject(&self, now: DateTime<Utc>) -> Result<Expense, DomainError> {
        if !self.can_be_rejected() {
            return Err(DomainError::InvalidTransition {
                status: self.status,
                action: ExpenseAction::Reject,
            });
        }
        let mut next = self.clone();
        next.status = ExpenseStatus::Rejected;
        next.updated_at = now;
        next.version = self.version + 1;
        Ok(next)
    }

    pub fn can_be_submitted(&self) -> bool {
        self.status == ExpenseStatus::Draft
    }

    pub fn can_be_approved(&self) -> bool {
        self.status == ExpenseStatus::Submitted
    }

    pub fn can_be_rejected(&self) -> bool {
        self.status == ExpenseStatus::Submitted
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn applicant_id(&self) -> i64 {
        self.applicant_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn status(&self) -> ExpenseStatus {
        self.status
    }

    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn version(&self) -> i32 {
        self.version
    }
}
