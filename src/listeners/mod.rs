//! Event listeners
//!
//! Reference subscribers shipped with the core: mail notifications and
//! analytics. Both are failure-isolated; the event bus logs their errors
//! and moves on.

mod analytics;
mod notification;

pub use analytics::AnalyticsListener;
pub use notification::{LoggingMailSender, Mail, MailError, MailSender, NotificationListener};
