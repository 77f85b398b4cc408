//! # Payment Repository
//!
//! Database operations for payments: lookups, the pending work queue, and
//! transfer proof attachment.
//!
//! ## Proof Attachment
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              Transfer Proof Flow                                        │
//! │                                                                         │
//! │  Member pays by bank transfer                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  attach_proof(payment_id, reference)                                   │
//! │       │                                                                 │
//! │       ▼  guarded: WHERE status = 'pending' AND method = 'transfer'     │
//! │  proof_reference stored                                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Staff reviews the proof → confirm / reject (decision repository)      │
//! │                                                                         │
//! │  Confirm WITHOUT a proof is refused there - the proof is what staff    │
//! │  attest to.                                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use atlas_core::{Payment, PaymentMethod};

/// Repository for payment database operations.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    /// Creates a new PaymentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    /// Gets a payment by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Payment> {
        sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Payment", id))
    }

    /// The payment funding a membership, if any.
    pub async fn get_for_membership(&self, membership_id: &str) -> DbResult<Payment> {
        sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE membership_id = ?1")
            .bind(membership_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Payment for membership", membership_id))
    }

    /// The payment funding a sale, if any.
    pub async fn get_for_sale(&self, sale_id: &str) -> DbResult<Payment> {
        sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE sale_id = ?1")
            .bind(sale_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Payment for sale", sale_id))
    }

    /// The staff work queue: pending payments, oldest first.
    pub async fn list_pending(&self) -> DbResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE status = 'pending' ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    /// Pending payments filtered by method (e.g. only transfers awaiting
    /// proof review).
    pub async fn list_pending_by_method(&self, method: PaymentMethod) -> DbResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE status = 'pending' AND method = ?1 ORDER BY created_at ASC",
        )
        .bind(method)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    /// Attaches (or replaces) the transfer proof on a pending transfer
    /// payment.
    ///
    /// Re-attaching before a decision is allowed - the member may have
    /// uploaded the wrong receipt. A completed or cancelled payment refuses
    /// the attachment.
    pub async fn attach_proof(&self, payment_id: &str, reference: &str) -> DbResult<Payment> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET proof_reference = ?2, updated_at = ?3
            WHERE id = ?1 AND status = 'pending' AND method = 'transfer'
            "#,
        )
        .bind(payment_id)
        .bind(reference)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Distinguish "no such payment" from "wrong state".
            let payment = self.get_by_id(payment_id).await?;
            return Err(DbError::QueryFailed(format!(
                "proof can only attach to a pending transfer payment (status: {:?}, method: {:?})",
                payment.status, payment.method
            )));
        }

        debug!(payment_id = %payment_id, "Transfer proof attached");
        self.get_by_id(payment_id).await
    }
}
