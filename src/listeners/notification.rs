//! Notification Listener
//!
//! Subscribes to lifecycle events and turns them into mail. Address lookup
//! goes through the user directory; the actual transport sits behind
//! [`MailSender`] so deployments can plug in their SMTP relay. The crate
//! ships [`LoggingMailSender`], which records the mail instead of sending
//! it.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::bus::{Subscriber, SubscriberError};
use crate::domain::{EventKind, ExpenseEvent};
use crate::store::UserDirectory;

/// An outbound mail message.
#[derive(Debug, Clone)]
pub struct Mail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error)]
#[error("mail delivery failed: {0}")]
pub struct MailError(pub String);

/// Mail transport boundary.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, mail: &Mail) -> Result<(), MailError>;
}

/// Reference transport: logs the mail it would have sent.
#[derive(Debug, Clone, Default)]
pub struct LoggingMailSender;

#[async_trait]
impl MailSender for LoggingMailSender {
    async fn send(&self, mail: &Mail) -> Result<(), MailError> {
        tracing::info!(
            to = %mail.to,
            from = %mail.from,
            subject = %mail.subject,
            "mail queued (logging transport)"
        );
        Ok(())
    }
}

/// Notifies applicants and approvers about expense transitions.
pub struct NotificationListener {
    directory: UserDirectory,
    sender: Arc<dyn MailSender>,
    from: String,
}

impl NotificationListener {
    pub fn new(directory: UserDirectory, sender: Arc<dyn MailSender>, from: String) -> Self {
        Self {
            directory,
            sender,
            from,
        }
    }

    async fn deliver(&self, to: String, subject: &str, body: String) -> Result<(), SubscriberError> {
        let mail = Mail {
            from: self.from.clone(),
            to,
            subject: subject.to_string(),
            body,
        };
        self.sender
            .send(&mail)
            .await
            .map_err(|e| SubscriberError::new(e.to_string()))
    }
}

#[async_trait]
impl Subscriber for NotificationListener {
    fn name(&self) -> &'static str {
        "notification"
    }

    fn interests(&self) -> &'static [EventKind] {
        &[EventKind::Submitted, EventKind::Approved, EventKind::Rejected]
    }

    async fn handle(&self, event: &ExpenseEvent) -> Result<(), SubscriberError> {
        match event {
            ExpenseEvent::ExpenseSubmitted {
                expense_id,
                trace_id,
                ..
            } => {
                let Some(to) = self
                    .directory
                    .any_approver_email()
                    .await
                    .map_err(|e| SubscriberError::new(e.to_string()))?
                else {
                    tracing::warn!(
                        expense_id,
                        trace_id = %trace_id,
                        "no approver address on file"
                    );
                    return Ok(());
                };
                self.deliver(
                    to,
                    "[Expenses] expense submitted",
                    format!("expenseId={expense_id}\ntraceId={trace_id}\n"),
                )
                .await
            }
            ExpenseEvent::ExpenseApproved {
                expense_id,
                applicant_id,
                trace_id,
                ..
            } => {
                let Some(to) = self
                    .directory
                    .email_of_applicant(*applicant_id)
                    .await
                    .map_err(|e| SubscriberError::new(e.to_string()))?
                else {
                    tracing::warn!(
                        expense_id,
                        applicant_id,
                        trace_id = %trace_id,
                        "applicant address not found"
                    );
                    return Ok(());
                };
                self.deliver(
                    to,
                    "[Expenses] expense approved",
                    format!("expenseId={expense_id}\ntraceId={trace_id}\n"),
                )
                .await
            }
            ExpenseEvent::ExpenseRejected {
                expense_id,
                applicant_id,
                reason,
                trace_id,
                ..
            } => {
                let Some(to) = self
                    .directory
                    .email_of_applicant(*applicant_id)
                    .await
                    .map_err(|e| SubscriberError::new(e.to_string()))?
                else {
                    tracing::warn!(
                        expense_id,
                        applicant_id,
                        trace_id = %trace_id,
                        "applicant address not found"
                    );
                    return Ok(());
                };
                self.deliver(
                    to,
                    "[Expenses] expense rejected",
                    format!("expenseId={expense_id}\nreason={reason}\ntraceId={trace_id}\n"),
                )
                .await
            }
            ExpenseEvent::ExpenseCreated { .. } => Ok(()),
        }
    }
}
