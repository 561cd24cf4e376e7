//! Request Context
//!
//! Carries the resolved actor identity, role set and trace id for one
//! request. Authentication happens up-stack; the lifecycle only ever sees
//! this already-resolved value, threaded explicitly into every operation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Roles recognized by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Applicant,
    Approver,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Applicant => "ROLE_APPLICANT",
            Role::Approver => "ROLE_APPROVER",
            Role::Admin => "ROLE_ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ROLE_APPLICANT" => Ok(Role::Applicant),
            "ROLE_APPROVER" => Ok(Role::Approver),
            "ROLE_ADMIN" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Per-request context: actor identity, roles and correlation id.
#[derive(Debug, Clone)]
pub struct RequestContext {
    actor_id: i64,
    roles: Vec<Role>,
    trace_id: String,
}

impl RequestContext {
    pub fn new(actor_id: i64, roles: Vec<Role>, trace_id: impl Into<String>) -> Self {
        Self {
            actor_id,
            roles,
            trace_id: trace_id.into(),
        }
    }

    /// Context with a freshly minted trace id (background work, tests).
    pub fn with_new_trace(actor_id: i64, roles: Vec<Role>) -> Self {
        Self::new(actor_id, roles, Uuid::new_v4().to_string())
    }

    pub fn actor_id(&self) -> i64 {
        self.actor_id
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }
}
