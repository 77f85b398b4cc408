//! # Notifications
//!
//! Post-commit notification events (member email, staff dashboard push).
//!
//! Notifications are strictly best-effort: they fire AFTER the transaction
//! committed, and a delivery failure is logged and dropped. The database is
//! the source of truth; a missed email never rolls back a sale.

use async_trait::async_trait;
use thiserror::Error;

/// A state change worth telling someone about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    /// A deferred payment is waiting for staff review.
    PaymentPending { payment_id: String },
    /// A membership reached `active` (confirm or card settlement).
    MembershipActivated {
        membership_id: String,
        member_id: String,
    },
    /// A pending membership purchase was rejected or cancelled.
    MembershipCancelled {
        membership_id: String,
        member_id: String,
    },
    /// A sale reached `completed`.
    SaleCompleted { sale_id: String },
    /// A pending sale was rejected or cancelled.
    SaleCancelled { sale_id: String },
}

/// Notification delivery failure.
#[derive(Debug, Error)]
#[error("Notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// A notification sink.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: NotificationEvent) -> Result<(), NotifyError>;
}

/// A notifier that drops everything; the default for deployments without a
/// delivery channel configured.
#[derive(Debug, Default, Clone)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify(&self, _event: NotificationEvent) -> Result<(), NotifyError> {
        Ok(())
    }
}
