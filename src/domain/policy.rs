//! Authorization Policy
//!
//! Pure predicates coupling actors to permissible expense actions. No I/O,
//! no side effects; every decision is a function of the request context and
//! the expense under action.
//!
//! The identity/role half of each rule is enforced here and surfaces as
//! [`DomainError::Unauthorized`]; the state half (a SUBMIT needs a DRAFT,
//! an APPROVE needs a SUBMITTED expense) is owned by the state machine and
//! surfaces as `InvalidTransition`, after authorization in the error order.

use std::fmt;

use super::context::{RequestContext, Role};
use super::error::DomainError;
use super::expense::Expense;

/// Intended action on an expense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpenseAction {
    Create,
    Submit,
    Approve,
    Reject,
    View,
}

impl ExpenseAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseAction::Create => "CREATE",
            ExpenseAction::Submit => "SUBMIT",
            ExpenseAction::Approve => "APPROVE",
            ExpenseAction::Reject => "REJECT",
            ExpenseAction::View => "VIEW",
        }
    }
}

impl fmt::Display for ExpenseAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row restriction folded into every search before execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityFilter {
    /// Approvers and admins see everything
    Unrestricted,
    /// Everyone else is pinned to their own expenses
    ApplicantOnly(i64),
}

/// Stateless policy over (actor, roles, expense, action).
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorizationPolicy;

impl AuthorizationPolicy {
    /// Check the actor-coupling rule for `action` against `expense`.
    pub fn authorize(
        &self,
        ctx: &RequestContext,
        expense: &Expense,
        action: ExpenseAction,
    ) -> Result<(), DomainError> {
        let allowed = match action {
            // Any authenticated actor may create; the context itself is the proof
            ExpenseAction::Create => true,
            ExpenseAction::Submit => expense.applicant_id() == ctx.actor_id(),
            ExpenseAction::Approve | ExpenseAction::Reject => ctx.has_role(Role::Approver),
            ExpenseAction::View => {
                expense.applicant_id() == ctx.actor_id()
                    || ctx.has_role(Role::Approver)
                    || ctx.has_role(Role::Admin)
            }
        };

        if allowed {
            Ok(())
        } else {
            Err(DomainError::Unauthorized {
                action,
                reason: self.deny_reason(action),
            })
        }
    }

    /// The full decision matrix, identity and state conjuncts together.
    pub fn allows(&self, ctx: &RequestContext, expense: &Expense, action: ExpenseAction) -> bool {
        if self.authorize(ctx, expense, action).is_err() {
            return false;
        }
        match action {
            ExpenseAction::Create | ExpenseAction::View => true,
            ExpenseAction::Submit => expense.can_be_submitted(),
            ExpenseAction::Approve => expense.can_be_approved(),
            ExpenseAction::Reject => expense.can_be_rejected(),
        }
    }

    /// Row restriction for searches: approvers/admins see all, others only
    /// their own expenses.
    pub fn visibility_filter(&self, ctx: &RequestContext) -> VisibilityFilter {
        if ctx.has_role(Role::Approver) || ctx.has_role(Role::Admin) {
            VisibilityFilter::Unrestricted
        } else {
            VisibilityFilter::ApplicantOnly(ctx.actor_id())
        }
    }

    fn deny_reason(&self, action: ExpenseAction) -> String {
        match action {
            ExpenseAction::Create => "authenticated actor required".to_string(),
            ExpenseAction::Submit => "only the applicant may submit".to_string(),
            ExpenseAction::Approve | ExpenseAction::Reject => {
                "ROLE_APPROVER required".to_string()
            }
            ExpenseAction::View => "only the applicant, approvers or admins may view".to_string(),
        }
    }
}
