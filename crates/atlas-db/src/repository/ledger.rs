//! # Financial Ledger Repository
//!
//! The append-only income ledger. A movement exists if and only if its
//! payment was confirmed, and the UNIQUE constraint on `payment_id` means a
//! second movement for the same payment fails instead of double-counting.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use atlas_core::{FinancialMovement, MovementKind};

/// Repository for financial ledger operations.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    /// Creates a new LedgerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    /// The movement recorded for a payment, if it was ever confirmed.
    pub async fn get_by_payment_id(&self, payment_id: &str) -> DbResult<FinancialMovement> {
        sqlx::query_as::<_, FinancialMovement>(
            "SELECT * FROM financial_movements WHERE payment_id = ?1",
        )
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("FinancialMovement", payment_id))
    }

    /// Recent movements, newest first.
    pub async fn list_recent(&self, limit: u32) -> DbResult<Vec<FinancialMovement>> {
        let movements = sqlx::query_as::<_, FinancialMovement>(
            "SELECT * FROM financial_movements ORDER BY recorded_at DESC, id DESC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Total confirmed income recorded in `[from, to)`.
    pub async fn income_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<i64> {
        let total: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT SUM(amount_cents) FROM financial_movements
            WHERE kind = 'income' AND recorded_at >= ?1 AND recorded_at < ?2
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        Ok(total.unwrap_or(0))
    }
}

/// Inserts the income movement for a confirmed payment, inside the
/// confirmation transaction.
///
/// A UNIQUE violation here is the double-income guard firing; the caller
/// must let it abort the transaction, never swallow it.
pub(crate) async fn insert_income_in(
    conn: &mut SqliteConnection,
    payment_id: &str,
    amount_cents: i64,
) -> DbResult<FinancialMovement> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO financial_movements (id, payment_id, kind, amount_cents, recorded_at)
        VALUES (?1, ?2, 'income', ?3, ?4)
        "#,
    )
    .bind(&id)
    .bind(payment_id)
    .bind(amount_cents)
    .bind(now)
    .execute(conn)
    .await?;

    Ok(FinancialMovement {
        id,
        payment_id: payment_id.to_string(),
        kind: MovementKind::Income,
        amount_cents,
        recorded_at: now,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::checkout::{MembershipCheckout, MembershipDraft};
    use crate::repository::plan::NewPlan;
    use crate::repository::slot::NewSlot;
    use atlas_core::{Decision, PaymentMethod, Weekday};
    use chrono::NaiveDate;

    async fn confirmed_payment(db: &Database) -> String {
        let plan = db
            .plans()
            .create(NewPlan {
                name: "Full".to_string(),
                price_cents: 6_000,
                allowed_days: Weekday::ALL.to_vec(),
                max_slots_per_day: 2,
                max_reservations_per_week: 6,
                total_capacity: 50,
            })
            .await
            .unwrap();
        let slot = db
            .slots()
            .create(NewSlot {
                weekday: Weekday::Monday,
                opens_at_min: 390,
                closes_at_min: 450,
                capacity: 10,
            })
            .await
            .unwrap();

        let outcome = db
            .checkout()
            .create_pending_membership(MembershipDraft {
                plan_id: plan.id,
                member_id: "member-1".to_string(),
                slot_ids: vec![slot.id],
                method: PaymentMethod::Cash,
                amount_cents: 6_000,
                start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                end_date: Some(NaiveDate::from_ymd_opt(2026, 1, 31).unwrap()),
                proof_reference: None,
                actor: "staff-1".to_string(),
            })
            .await
            .unwrap();
        let payment_id = match outcome {
            MembershipCheckout::Created { payment, .. } => payment.id,
            other => panic!("unexpected: {other:?}"),
        };

        db.decisions()
            .apply(&payment_id, &Decision::Confirm { note: None }, "manager-1")
            .await
            .unwrap();
        payment_id
    }

    #[tokio::test]
    async fn test_second_movement_for_same_payment_fails_loudly() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let payment_id = confirmed_payment(&db).await;

        assert_eq!(
            db.ledger().get_by_payment_id(&payment_id).await.unwrap().amount_cents,
            6_000
        );

        let mut tx = db.pool().begin().await.unwrap();
        let err = insert_income_in(&mut tx, &payment_id, 6_000)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_income_between_sums_window() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let _payment_id = confirmed_payment(&db).await;

        let now = Utc::now();
        let total = db
            .ledger()
            .income_between(now - chrono::Duration::hours(1), now + chrono::Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(total, 6_000);

        let empty = db
            .ledger()
            .income_between(now + chrono::Duration::hours(1), now + chrono::Duration::hours(2))
            .await
            .unwrap();
        assert_eq!(empty, 0);
    }
}
