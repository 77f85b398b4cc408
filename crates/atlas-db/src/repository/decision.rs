//! # Decision Repository
//!
//! Applies staff decisions (confirm / reject / cancel) to pending payments
//! as one atomic unit.
//!
//! ## Compare-And-Set Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  One Decision, One Transaction                          │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    UPDATE payments SET status = <target>, decided_by = ?, ...          │
//! │    WHERE id = ? AND status = 'pending'        ← FIRST statement        │
//! │         │                                                               │
//! │         ├─ 0 rows → already decided: report who/when, mutate NOTHING   │
//! │         │                                                               │
//! │         ▼ 1 row                                                         │
//! │    confirm: income movement (UNIQUE payment_id) + entity → active      │
//! │    reject/cancel: entity → cancelled + release slots / restore stock   │
//! │    audit record                                                         │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The guarded UPDATE being the first write means two racing decisions
//! serialize on it: exactly one sees `rows_affected = 1`, the loser reports
//! `AlreadyProcessed` and leaves no trace. Confirm on a transfer without an
//! attached proof rolls back and reports `MissingProof`.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::capacity::{release_plan_in, release_slots_in, release_stock_in};
use crate::repository::ledger::insert_income_in;
use atlas_core::{
    Decision, DecisionOutcome, LinkedEntity, Payment, PaymentAuditRecord, PaymentMethod,
    PaymentStatus,
};

/// Repository for payment decisions and the audit trail.
#[derive(Debug, Clone)]
pub struct DecisionRepository {
    pool: SqlitePool,
}

impl DecisionRepository {
    /// Creates a new DecisionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        DecisionRepository { pool }
    }

    /// Applies a decision to a pending payment.
    ///
    /// ## Returns
    /// - `Applied(payment)` - the decision won the compare-and-set and every
    ///   linked effect committed with it
    /// - `AlreadyProcessed { .. }` - the payment was already terminal;
    ///   nothing changed
    /// - `MissingProof { .. }` - confirm on a transfer without a proof;
    ///   rolled back
    pub async fn apply(
        &self,
        payment_id: &str,
        decision: &Decision,
        actor: &str,
    ) -> DbResult<DecisionOutcome> {
        let target = decision.target_status();
        let note = match decision {
            Decision::Confirm { note } => note.clone(),
            Decision::Reject { reason } | Decision::Cancel { reason } => Some(reason.clone()),
        };
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        // The CAS. First write in the transaction, so racing decisions
        // serialize here instead of deadlocking on a later statement.
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = ?2, decided_by = ?3, decided_at = ?4,
                decision_note = ?5, updated_at = ?4
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(payment_id)
        .bind(target)
        .bind(actor)
        .bind(now)
        .bind(&note)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;

            let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = ?1")
                .bind(payment_id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| DbError::not_found("Payment", payment_id))?;

            debug!(
                payment_id = %payment_id,
                status = ?payment.status,
                "Decision lost the compare-and-set"
            );
            return Ok(DecisionOutcome::AlreadyProcessed {
                payment_id: payment.id,
                status: payment.status,
                decided_by: payment.decided_by,
                decided_at: payment.decided_at,
            });
        }

        let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = ?1")
            .bind(payment_id)
            .fetch_one(&mut *tx)
            .await?;

        // A transfer is confirmed against its proof; without one there is
        // nothing for staff to attest to.
        if matches!(decision, Decision::Confirm { .. })
            && payment.method == PaymentMethod::Transfer
            && payment.proof_reference.is_none()
        {
            tx.rollback().await?;
            warn!(payment_id = %payment_id, "Confirm refused: transfer has no proof");
            return Ok(DecisionOutcome::MissingProof {
                payment_id: payment_id.to_string(),
            });
        }

        match target {
            PaymentStatus::Completed => {
                insert_income_in(&mut tx, payment_id, payment.amount_cents).await?;
                self.activate_entity_in(&mut tx, &payment).await?;
            }
            PaymentStatus::Cancelled => {
                self.compensate_entity_in(&mut tx, &payment).await?;
            }
            PaymentStatus::Pending => unreachable!("decisions only target terminal statuses"),
        }

        sqlx::query(
            r#"
            INSERT INTO payment_audit (id, payment_id, action, actor, reason, recorded_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(payment_id)
        .bind(decision.audit_action())
        .bind(actor)
        .bind(&note)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(
            payment_id = %payment_id,
            target = ?target,
            actor = %actor,
            "Decision applied"
        );

        Ok(DecisionOutcome::Applied(payment))
    }

    /// The full audit trail of a payment, oldest first.
    pub async fn audit_trail(&self, payment_id: &str) -> DbResult<Vec<PaymentAuditRecord>> {
        let records = sqlx::query_as::<_, PaymentAuditRecord>(
            "SELECT * FROM payment_audit WHERE payment_id = ?1 ORDER BY recorded_at ASC, id ASC",
        )
        .bind(payment_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Moves the linked entity to its settled status on confirm.
    async fn activate_entity_in(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        payment: &Payment,
    ) -> DbResult<()> {
        match payment.linked_entity() {
            LinkedEntity::Membership(membership_id) => {
                sqlx::query(
                    r#"
                    UPDATE memberships
                    SET status = 'active', updated_at = ?2
                    WHERE id = ?1 AND status IN ('pending_cash', 'pending_transfer')
                    "#,
                )
                .bind(&membership_id)
                .bind(Utc::now())
                .execute(&mut **tx)
                .await?;
            }
            LinkedEntity::Sale(sale_id) => {
                sqlx::query(
                    r#"
                    UPDATE local_sales
                    SET status = 'completed', completed_at = ?2, updated_at = ?2
                    WHERE id = ?1 AND status IN ('pending_cash', 'pending_transfer')
                    "#,
                )
                .bind(&sale_id)
                .bind(Utc::now())
                .execute(&mut **tx)
                .await?;
            }
        }
        Ok(())
    }

    /// Cancels the linked entity and gives its capacity back on
    /// reject/cancel.
    async fn compensate_entity_in(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        payment: &Payment,
    ) -> DbResult<()> {
        match payment.linked_entity() {
            LinkedEntity::Membership(membership_id) => {
                let result = sqlx::query(
                    r#"
                    UPDATE memberships
                    SET status = 'cancelled', updated_at = ?2
                    WHERE id = ?1 AND status IN ('pending_cash', 'pending_transfer')
                    "#,
                )
                .bind(&membership_id)
                .bind(Utc::now())
                .execute(&mut **tx)
                .await?;

                // Release only when this statement did the cancelling; a
                // membership already out of pending gave its capacity back
                // elsewhere.
                if result.rows_affected() == 1 {
                    let plan_id: String =
                        sqlx::query_scalar("SELECT plan_id FROM memberships WHERE id = ?1")
                            .bind(&membership_id)
                            .fetch_one(&mut **tx)
                            .await?;

                    let slot_ids: Vec<(String,)> = sqlx::query_as(
                        "SELECT slot_id FROM membership_slots WHERE membership_id = ?1",
                    )
                    .bind(&membership_id)
                    .fetch_all(&mut **tx)
                    .await?;
                    let slot_ids: Vec<String> = slot_ids.into_iter().map(|(s,)| s).collect();
                    release_slots_in(tx, &slot_ids).await?;
                    release_plan_in(tx, &plan_id).await?;
                }
            }
            LinkedEntity::Sale(sale_id) => {
                sqlx::query(
                    r#"
                    UPDATE local_sales
                    SET status = 'cancelled', updated_at = ?2
                    WHERE id = ?1 AND status IN ('pending_cash', 'pending_transfer')
                    "#,
                )
                .bind(&sale_id)
                .bind(Utc::now())
                .execute(&mut **tx)
                .await?;

                let lines: Vec<(String, i64)> =
                    sqlx::query_as("SELECT product_id, quantity FROM sale_items WHERE sale_id = ?1")
                        .bind(&sale_id)
                        .fetch_all(&mut **tx)
                        .await?;
                release_stock_in(tx, &lines).await?;
            }
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};
    use crate::repository::checkout::{
        MembershipCheckout, MembershipDraft, SaleCheckout, SaleDraft, SaleLine,
    };
    use crate::repository::plan::NewPlan;
    use crate::repository::product::NewProduct;
    use crate::repository::slot::NewSlot;
    use atlas_core::{
        AuditAction, Decision, DecisionOutcome, MembershipStatus, PaymentMethod, PaymentStatus,
        SaleStatus, Weekday,
    };
    use chrono::NaiveDate;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    /// Seeds a plan + slot and creates a pending membership purchase.
    async fn pending_membership(
        db: &Database,
        method: PaymentMethod,
    ) -> (String, String, String) {
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
                slot_ids: vec![slot.id.clone()],
                method,
                amount_cents: 6_000,
                start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                end_date: Some(NaiveDate::from_ymd_opt(2026, 1, 31).unwrap()),
                proof_reference: None,
                actor: "staff-1".to_string(),
            })
            .await
            .unwrap();

        match outcome {
            MembershipCheckout::Created {
                membership,
                payment,
            } => (membership.id, payment.id, slot.id),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_confirm_cash_activates_and_records_income() {
        let db = test_db().await;
        let (membership_id, payment_id, _slot) =
            pending_membership(&db, PaymentMethod::Cash).await;

        let outcome = db
            .decisions()
            .apply(&payment_id, &Decision::Confirm { note: None }, "staff-2")
            .await
            .unwrap();

        let payment = match outcome {
            DecisionOutcome::Applied(p) => p,
            other => panic!("unexpected: {other:?}"),
        };
        assert_eq!(payment.status, PaymentStatus::Completed);
        assert_eq!(payment.decided_by.as_deref(), Some("staff-2"));

        let membership = db.memberships().get_by_id(&membership_id).await.unwrap();
        assert_eq!(membership.status, MembershipStatus::Active);

        let movement = db.ledger().get_by_payment_id(&payment_id).await.unwrap();
        assert_eq!(movement.amount_cents, 6_000);

        let trail = db.decisions().audit_trail(&payment_id).await.unwrap();
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[0].action, AuditAction::Created);
        assert_eq!(trail[1].action, AuditAction::Confirmed);
        assert_eq!(trail[1].actor, "staff-2");
    }

    #[tokio::test]
    async fn test_second_decision_is_already_processed() {
        let db = test_db().await;
        let (_m, payment_id, _s) = pending_membership(&db, PaymentMethod::Cash).await;

        db.decisions()
            .apply(&payment_id, &Decision::Confirm { note: None }, "staff-2")
            .await
            .unwrap();

        let outcome = db
            .decisions()
            .apply(
                &payment_id,
                &Decision::Reject {
                    reason: "never mind".to_string(),
                },
                "staff-3",
            )
            .await
            .unwrap();

        match outcome {
            DecisionOutcome::AlreadyProcessed {
                status, decided_by, ..
            } => {
                assert_eq!(status, PaymentStatus::Completed);
                assert_eq!(decided_by.as_deref(), Some("staff-2"));
            }
            other => panic!("unexpected: {other:?}"),
        }

        // The loser left no trace: one movement, two audit rows.
        let trail = db.decisions().audit_trail(&payment_id).await.unwrap();
        assert_eq!(trail.len(), 2);
        assert!(db.ledger().get_by_payment_id(&payment_id).await.is_ok());
    }

    #[tokio::test]
    async fn test_confirm_transfer_without_proof_is_refused() {
        let db = test_db().await;
        let (membership_id, payment_id, _s) =
            pending_membership(&db, PaymentMethod::Transfer).await;

        let outcome = db
            .decisions()
            .apply(&payment_id, &Decision::Confirm { note: None }, "staff-2")
            .await
            .unwrap();
        assert!(matches!(outcome, DecisionOutcome::MissingProof { .. }));

        // Rolled back completely: still pending, no income.
        let payment = db.payments().get_by_id(&payment_id).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert!(db.ledger().get_by_payment_id(&payment_id).await.is_err());
        assert_eq!(
            db.memberships().get_by_id(&membership_id).await.unwrap().status,
            MembershipStatus::PendingTransfer
        );

        // Attach the proof; confirm now goes through.
        db.payments()
            .attach_proof(&payment_id, "receipt-778")
            .await
            .unwrap();
        let outcome = db
            .decisions()
            .apply(&payment_id, &Decision::Confirm { note: None }, "staff-2")
            .await
            .unwrap();
        assert!(matches!(outcome, DecisionOutcome::Applied(_)));
    }

    #[tokio::test]
    async fn test_reject_membership_releases_slots() {
        let db = test_db().await;
        let (membership_id, payment_id, slot_id) =
            pending_membership(&db, PaymentMethod::Cash).await;

        assert_eq!(db.slots().get_by_id(&slot_id).await.unwrap().reserved_count, 1);
        let seats: i64 = sqlx::query_scalar("SELECT member_count FROM plans")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(seats, 1);

        let outcome = db
            .decisions()
            .apply(
                &payment_id,
                &Decision::Reject {
                    reason: "member walked out".to_string(),
                },
                "staff-2",
            )
            .await
            .unwrap();
        assert!(matches!(outcome, DecisionOutcome::Applied(_)));

        assert_eq!(db.slots().get_by_id(&slot_id).await.unwrap().reserved_count, 0);
        let seats: i64 = sqlx::query_scalar("SELECT member_count FROM plans")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(seats, 0);
        assert_eq!(
            db.memberships().get_by_id(&membership_id).await.unwrap().status,
            MembershipStatus::Cancelled
        );
        assert!(db.ledger().get_by_payment_id(&payment_id).await.is_err());
    }

    #[tokio::test]
    async fn test_cancel_sale_restores_stock() {
        let db = test_db().await;
        let product = db
            .products()
            .create(NewProduct {
                sku: "SHAKE-1".to_string(),
                name: "Shake".to_string(),
                price_cents: 350,
                stock_quantity: 5,
                min_stock: 0,
            })
            .await
            .unwrap();

        let outcome = db
            .checkout()
            .create_pending_sale(SaleDraft {
                lines: vec![SaleLine {
                    product_id: product.id.clone(),
                    quantity: 2,
                }],
                method: PaymentMethod::Cash,
                proof_reference: None,
                sold_by: "staff-1".to_string(),
                notes: None,
            })
            .await
            .unwrap();
        let (sale, payment) = match outcome {
            SaleCheckout::Created { sale, payment, .. } => (sale, payment),
            other => panic!("unexpected: {other:?}"),
        };
        assert_eq!(db.products().get_by_id(&product.id).await.unwrap().stock_quantity, 3);

        db.decisions()
            .apply(
                &payment.id,
                &Decision::Cancel {
                    reason: "customer left".to_string(),
                },
                "staff-1",
            )
            .await
            .unwrap();

        // 5 - 2 + 2 = 5: the shelf is whole again.
        assert_eq!(db.products().get_by_id(&product.id).await.unwrap().stock_quantity, 5);
        assert_eq!(
            db.sales().get_by_id(&sale.id).await.unwrap().status,
            SaleStatus::Cancelled
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_decisions_one_winner_one_ledger_row() {
        // File-backed so two pool handles share the database.
        let dir = std::env::temp_dir().join(format!("atlas-race-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("race.db");

        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        let (_m, payment_id, _s) = pending_membership(&db, PaymentMethod::Cash).await;

        let d1 = db.decisions();
        let d2 = db.decisions();
        let p1 = payment_id.clone();
        let p2 = payment_id.clone();

        let (r1, r2) = tokio::join!(
            tokio::spawn(async move {
                d1.apply(&p1, &Decision::Confirm { note: None }, "staff-a").await
            }),
            tokio::spawn(async move {
                d2.apply(&p2, &Decision::Confirm { note: None }, "staff-b").await
            }),
        );
        let outcomes = [r1.unwrap().unwrap(), r2.unwrap().unwrap()];

        let applied = outcomes
            .iter()
            .filter(|o| matches!(o, DecisionOutcome::Applied(_)))
            .count();
        let already = outcomes
            .iter()
            .filter(|o| matches!(o, DecisionOutcome::AlreadyProcessed { .. }))
            .count();
        assert_eq!(applied, 1);
        assert_eq!(already, 1);

        let movements: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM financial_movements WHERE payment_id = ?1")
                .bind(&payment_id)
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert_eq!(movements, 1);

        db.close().await;
        let _ = std::fs::remove_dir_all(&dir);
    }
}
