//! Collaborators the engine calls into: the account directory, passenger
//! notifications and the administrative audit log.

pub mod audit;
pub mod directory;
pub mod notifier;

pub use audit::{AuditAction, AuditEntry, AuditSink, DbAuditSink};
pub use directory::{DbDirectory, Directory};
pub use notifier::{LogNotifier, Notifier, WebhookNotifier};
