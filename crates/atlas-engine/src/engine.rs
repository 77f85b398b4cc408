//! # Confirmation Engine
//!
//! Staff decisions on pending payments: confirm, reject, cancel, plus the
//! pending queue and audit trail views.
//!
//! The atomic work happens in the decision repository; this layer adds
//! capability checks, reason validation, and post-commit notifications.
//! Duplicate decisions are not failures here - staff double-clicking or
//! two managers racing both get a clean `AlreadyProcessed` answer telling
//! them who actually decided the payment.

use std::sync::Arc;

use tracing::warn;

use atlas_core::validation::{validate_id, validate_reference};
use atlas_core::{
    Decision, DecisionOutcome, LinkedEntity, Payment, PaymentAuditRecord, PaymentMethod,
    PaymentStatus,
};
use atlas_db::Database;

use crate::actor::{Actor, Capability};
use crate::error::{EngineError, EngineResult};
use crate::notify::{NotificationEvent, Notifier};

/// Orchestrates payment decisions.
#[derive(Clone)]
pub struct ConfirmationEngine {
    db: Database,
    notifier: Arc<dyn Notifier>,
}

impl ConfirmationEngine {
    pub fn new(db: Database, notifier: Arc<dyn Notifier>) -> Self {
        ConfirmationEngine { db, notifier }
    }

    /// Confirms a pending payment: money was received.
    ///
    /// Completes the payment, writes the income movement, and activates the
    /// linked membership or sale, all in one transaction. A transfer
    /// payment with no attached proof comes back as `MissingProof`.
    pub async fn confirm_payment(
        &self,
        actor: &Actor,
        payment_id: &str,
        note: Option<String>,
    ) -> EngineResult<DecisionOutcome> {
        actor.require(Capability::DecidePayments, "confirm payment")?;
        validate_id("payment_id", payment_id)
            .map_err(|e| EngineError::Validation(e.to_string()))?;

        let outcome = self
            .db
            .decisions()
            .apply(payment_id, &Decision::Confirm { note }, &actor.id)
            .await?;
        self.emit_for(&outcome).await;
        Ok(outcome)
    }

    /// Rejects a pending payment (e.g. the transfer proof doesn't add up).
    ///
    /// Cancels the payment and the linked entity, and gives the reserved
    /// capacity back.
    pub async fn reject_payment(
        &self,
        actor: &Actor,
        payment_id: &str,
        reason: String,
    ) -> EngineResult<DecisionOutcome> {
        actor.require(Capability::DecidePayments, "reject payment")?;
        validate_id("payment_id", payment_id)
            .map_err(|e| EngineError::Validation(e.to_string()))?;
        validate_reference("reason", &reason)
            .map_err(|e| EngineError::Validation(e.to_string()))?;

        let outcome = self
            .db
            .decisions()
            .apply(payment_id, &Decision::Reject { reason }, &actor.id)
            .await?;
        self.emit_for(&outcome).await;
        Ok(outcome)
    }

    /// Cancels a pending payment at the purchaser's request.
    ///
    /// Same effects as a rejection; the audit trail records the different
    /// intent.
    pub async fn cancel_pending_payment(
        &self,
        actor: &Actor,
        payment_id: &str,
        reason: String,
    ) -> EngineResult<DecisionOutcome> {
        actor.require(Capability::DecidePayments, "cancel payment")?;
        validate_id("payment_id", payment_id)
            .map_err(|e| EngineError::Validation(e.to_string()))?;
        validate_reference("reason", &reason)
            .map_err(|e| EngineError::Validation(e.to_string()))?;

        let outcome = self
            .db
            .decisions()
            .apply(payment_id, &Decision::Cancel { reason }, &actor.id)
            .await?;
        self.emit_for(&outcome).await;
        Ok(outcome)
    }

    /// The staff review queue: pending payments, oldest first.
    pub async fn pending_queue(&self) -> EngineResult<Vec<Payment>> {
        Ok(self.db.payments().list_pending().await?)
    }

    /// Pending transfers awaiting proof review.
    pub async fn pending_transfers(&self) -> EngineResult<Vec<Payment>> {
        Ok(self
            .db
            .payments()
            .list_pending_by_method(PaymentMethod::Transfer)
            .await?)
    }

    /// The full audit trail of a payment.
    pub async fn audit_trail(&self, payment_id: &str) -> EngineResult<Vec<PaymentAuditRecord>> {
        validate_id("payment_id", payment_id)
            .map_err(|e| EngineError::Validation(e.to_string()))?;
        Ok(self.db.decisions().audit_trail(payment_id).await?)
    }

    /// Post-commit notification for an applied decision.
    async fn emit_for(&self, outcome: &DecisionOutcome) {
        let DecisionOutcome::Applied(payment) = outcome else {
            return;
        };

        let event = match (payment.linked_entity(), payment.status) {
            (LinkedEntity::Membership(membership_id), PaymentStatus::Completed) => {
                match self.db.memberships().get_by_id(&membership_id).await {
                    Ok(m) => NotificationEvent::MembershipActivated {
                        membership_id,
                        member_id: m.member_id,
                    },
                    Err(err) => {
                        warn!(%err, "Skipping notification: membership lookup failed");
                        return;
                    }
                }
            }
            (LinkedEntity::Membership(membership_id), _) => {
                match self.db.memberships().get_by_id(&membership_id).await {
                    Ok(m) => NotificationEvent::MembershipCancelled {
                        membership_id,
                        member_id: m.member_id,
                    },
                    Err(err) => {
                        warn!(%err, "Skipping notification: membership lookup failed");
                        return;
                    }
                }
            }
            (LinkedEntity::Sale(sale_id), PaymentStatus::Completed) => {
                NotificationEvent::SaleCompleted { sale_id }
            }
            (LinkedEntity::Sale(sale_id), _) => NotificationEvent::SaleCancelled { sale_id },
        };

        if let Err(err) = self.notifier.notify(event.clone()).await {
            warn!(?event, %err, "Notification delivery failed");
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
