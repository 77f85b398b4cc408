//! # Checkout Repository
//!
//! Atomic purchase creation: a membership or sale, its capacity
//! reservation, its payment, and the `created` audit record all land in ONE
//! transaction, or none of them do.
//!
//! ## Two Entry Points Per Entity
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Checkout Transactions                              │
//! │                                                                         │
//! │  Cash / Transfer (deferred settlement)                                 │
//! │  ─────────────────────────────────────                                 │
//! │  create_pending_*:                                                     │
//! │    reserve capacity ──► entity (pending_*) ──► payment (pending)       │
//! │    ──► audit(created)              [one transaction]                   │
//! │                                                                         │
//! │  Card (synchronous settlement)                                         │
//! │  ─────────────────────────────                                         │
//! │  The engine reserves capacity FIRST (its own transaction), charges     │
//! │  the gateway, then calls finalize_card_*:                              │
//! │    entity (active/completed) ──► payment (completed) ──► ledger        │
//! │    ──► audit(created + confirmed)  [one transaction]                   │
//! │                                                                         │
//! │  A failed charge releases the reservation; a successful charge can     │
//! │  never lose it.                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Capacity conflicts are not errors: they come back as a `Conflict` value
//! carrying every failed unit, and the transaction is rolled back.

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::capacity::{claim_plan_in, reserve_slots_in, reserve_stock_in};
use crate::repository::ledger::insert_income_in;
use atlas_core::{
    CapacityConflict, LocalSale, Membership, MembershipStatus, Money, Payment, PaymentMethod,
    PaymentStatus, SaleItem, SaleStatus,
};

// =============================================================================
// Inputs
// =============================================================================

/// Everything needed to create a membership purchase.
///
/// The engine validates the draft (plan rules, slot selection) before it
/// reaches this repository; here it is taken at face value.
#[derive(Debug, Clone)]
pub struct MembershipDraft {
    pub plan_id: String,
    pub member_id: String,
    /// Schedule slots to reserve, one unit each.
    pub slot_ids: Vec<String>,
    pub method: PaymentMethod,
    pub amount_cents: i64,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    /// Transfer proof supplied up front, if the member already has one.
    pub proof_reference: Option<String>,
    /// Staff member (or "member-portal") creating the purchase.
    pub actor: String,
}

/// One requested line of a sale.
#[derive(Debug, Clone)]
pub struct SaleLine {
    pub product_id: String,
    pub quantity: i64,
}

/// Everything needed to create a front-desk sale.
#[derive(Debug, Clone)]
pub struct SaleDraft {
    pub lines: Vec<SaleLine>,
    pub method: PaymentMethod,
    /// Transfer proof supplied up front, if any.
    pub proof_reference: Option<String>,
    pub sold_by: String,
    pub notes: Option<String>,
}

/// A sale line priced against the catalog: the frozen sku/name/price
/// snapshot the sale items are written from.
///
/// The card flow prices BEFORE the gateway charge and finalizes from the
/// same snapshot, so the charged amount and the recorded amount cannot
/// diverge if a price changes in between.
#[derive(Debug, Clone)]
pub struct PricedLine {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub line_total_cents: i64,
}

impl PricedLine {
    /// The total of a priced line set.
    pub fn total(lines: &[PricedLine]) -> Money {
        lines
            .iter()
            .map(|l| Money::from_cents(l.line_total_cents))
            .sum()
    }
}

// =============================================================================
// Outcomes
// =============================================================================

/// Result of a membership checkout.
#[derive(Debug, Clone)]
pub enum MembershipCheckout {
    Created {
        membership: Membership,
        payment: Payment,
    },
    /// Capacity check failed; nothing was written.
    Conflict(Vec<CapacityConflict>),
}

/// Result of a sale checkout.
#[derive(Debug, Clone)]
pub enum SaleCheckout {
    Created {
        sale: LocalSale,
        items: Vec<SaleItem>,
        payment: Payment,
    },
    /// Stock check failed; nothing was written.
    Conflict(Vec<CapacityConflict>),
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for atomic purchase creation.
#[derive(Debug, Clone)]
pub struct CheckoutRepository {
    pool: SqlitePool,
}

impl CheckoutRepository {
    /// Creates a new CheckoutRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CheckoutRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Memberships
    // -------------------------------------------------------------------------

    /// Creates a pending membership purchase (cash or transfer).
    ///
    /// One transaction: slot reservation, membership row in its pending
    /// status, membership_slots join rows, pending payment, `created` audit
    /// record. A capacity conflict rolls back all of it.
    pub async fn create_pending_membership(
        &self,
        draft: MembershipDraft,
    ) -> DbResult<MembershipCheckout> {
        let pending_status = match draft.method {
            PaymentMethod::Cash => MembershipStatus::PendingCash,
            PaymentMethod::Transfer => MembershipStatus::PendingTransfer,
            PaymentMethod::Card => {
                return Err(DbError::Internal(
                    "card purchases settle through finalize_card_membership".to_string(),
                ))
            }
        };

        let mut tx = self.pool.begin().await?;

        // Slots and the plan's member cap are claimed together; either
        // running out aborts the whole intent.
        let mut conflicts = reserve_slots_in(&mut tx, &draft.slot_ids).await?;
        if let Some(conflict) = claim_plan_in(&mut tx, &draft.plan_id).await? {
            conflicts.push(conflict);
        }
        if !conflicts.is_empty() {
            tx.rollback().await?;
            debug!(conflicts = conflicts.len(), "Membership checkout conflicted");
            return Ok(MembershipCheckout::Conflict(conflicts));
        }

        let membership_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO memberships
                (id, plan_id, member_id, status, start_date, end_date, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            "#,
        )
        .bind(&membership_id)
        .bind(&draft.plan_id)
        .bind(&draft.member_id)
        .bind(pending_status)
        .bind(draft.start_date)
        .bind(draft.end_date)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for slot_id in &draft.slot_ids {
            sqlx::query("INSERT INTO membership_slots (membership_id, slot_id) VALUES (?1, ?2)")
                .bind(&membership_id)
                .bind(slot_id)
                .execute(&mut *tx)
                .await?;
        }

        let payment_id = insert_payment_in(
            &mut tx,
            draft.method,
            PaymentStatus::Pending,
            draft.amount_cents,
            Some(&membership_id),
            None,
            draft.proof_reference.as_deref(),
            None,
        )
        .await?;

        insert_created_audit_in(&mut tx, &payment_id, &draft.actor).await?;

        tx.commit().await?;
        info!(
            membership_id = %membership_id,
            payment_id = %payment_id,
            method = ?draft.method,
            "Pending membership created"
        );

        let membership = fetch_membership(&self.pool, &membership_id).await?;
        let payment = fetch_payment(&self.pool, &payment_id).await?;
        Ok(MembershipCheckout::Created {
            membership,
            payment,
        })
    }

    /// Finalizes a card membership purchase after a successful gateway
    /// charge.
    ///
    /// The slots and the plan's member cap were already claimed by the
    /// engine before the charge; this transaction writes the active
    /// membership, the completed payment, the income movement, and both
    /// audit records.
    pub async fn finalize_card_membership(
        &self,
        draft: MembershipDraft,
        gateway_reference: &str,
    ) -> DbResult<MembershipCheckout> {
        let mut tx = self.pool.begin().await?;

        let membership_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO memberships
                (id, plan_id, member_id, status, start_date, end_date, created_at, updated_at)
            VALUES (?1, ?2, ?3, 'active', ?4, ?5, ?6, ?6)
            "#,
        )
        .bind(&membership_id)
        .bind(&draft.plan_id)
        .bind(&draft.member_id)
        .bind(draft.start_date)
        .bind(draft.end_date)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for slot_id in &draft.slot_ids {
            sqlx::query("INSERT INTO membership_slots (membership_id, slot_id) VALUES (?1, ?2)")
                .bind(&membership_id)
                .bind(slot_id)
                .execute(&mut *tx)
                .await?;
        }

        let payment_id = insert_payment_in(
            &mut tx,
            PaymentMethod::Card,
            PaymentStatus::Completed,
            draft.amount_cents,
            Some(&membership_id),
            None,
            None,
            Some(gateway_reference),
        )
        .await?;

        insert_income_in(&mut tx, &payment_id, draft.amount_cents).await?;
        insert_created_audit_in(&mut tx, &payment_id, &draft.actor).await?;
        insert_confirmed_audit_in(&mut tx, &payment_id, "gateway", Some(gateway_reference))
            .await?;

        tx.commit().await?;
        info!(
            membership_id = %membership_id,
            payment_id = %payment_id,
            "Card membership finalized"
        );

        let membership = fetch_membership(&self.pool, &membership_id).await?;
        let payment = fetch_payment(&self.pool, &payment_id).await?;
        Ok(MembershipCheckout::Created {
            membership,
            payment,
        })
    }

    // -------------------------------------------------------------------------
    // Sales
    // -------------------------------------------------------------------------

    /// Creates a pending front-desk sale (cash or transfer).
    ///
    /// Stock is decremented NOW - the goods leave the shelf when the sale
    /// is rung up, not when the money is confirmed. Product data is frozen
    /// into the line items inside the same transaction.
    pub async fn create_pending_sale(&self, draft: SaleDraft) -> DbResult<SaleCheckout> {
        let pending_status = match draft.method {
            PaymentMethod::Cash => SaleStatus::PendingCash,
            PaymentMethod::Transfer => SaleStatus::PendingTransfer,
            PaymentMethod::Card => {
                return Err(DbError::Internal(
                    "card sales settle through finalize_card_sale".to_string(),
                ))
            }
        };

        let mut tx = self.pool.begin().await?;

        let lines: Vec<(String, i64)> = draft
            .lines
            .iter()
            .map(|l| (l.product_id.clone(), l.quantity))
            .collect();

        let conflicts = reserve_stock_in(&mut tx, &lines).await?;
        if !conflicts.is_empty() {
            tx.rollback().await?;
            debug!(conflicts = conflicts.len(), "Sale checkout conflicted");
            return Ok(SaleCheckout::Conflict(conflicts));
        }

        // Price inside the same transaction as the stock reservation, so
        // the snapshot sees consistent product rows.
        let priced = price_lines_in(&mut tx, &draft.lines).await?;
        let (sale_id, total_cents) =
            insert_sale_rows_in(&mut tx, &draft, pending_status, &priced).await?;

        let payment_id = insert_payment_in(
            &mut tx,
            draft.method,
            PaymentStatus::Pending,
            total_cents,
            None,
            Some(&sale_id),
            draft.proof_reference.as_deref(),
            None,
        )
        .await?;

        insert_created_audit_in(&mut tx, &payment_id, &draft.sold_by).await?;

        tx.commit().await?;
        info!(
            sale_id = %sale_id,
            payment_id = %payment_id,
            total_cents,
            method = ?draft.method,
            "Pending sale created"
        );

        self.assemble_sale(&sale_id, &payment_id).await
    }

    /// Prices the requested lines against the current catalog.
    ///
    /// The card flow charges exactly this total and hands the snapshot back
    /// to [`finalize_card_sale`](Self::finalize_card_sale), which writes it
    /// verbatim.
    pub async fn price_sale(&self, lines: &[SaleLine]) -> DbResult<Vec<PricedLine>> {
        let mut conn = self.pool.acquire().await?;
        price_lines_in(&mut conn, lines).await
    }

    /// Finalizes a card sale after a successful gateway charge.
    ///
    /// The engine reserved the stock and priced the lines before the
    /// charge; this transaction writes the completed sale and the priced
    /// items exactly as charged, plus the completed payment, the income
    /// movement, and both audit records.
    pub async fn finalize_card_sale(
        &self,
        draft: SaleDraft,
        priced: &[PricedLine],
        gateway_reference: &str,
    ) -> DbResult<SaleCheckout> {
        let mut tx = self.pool.begin().await?;

        let (sale_id, total_cents) =
            insert_sale_rows_in(&mut tx, &draft, SaleStatus::Completed, priced).await?;

        sqlx::query("UPDATE local_sales SET completed_at = ?2 WHERE id = ?1")
            .bind(&sale_id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        let payment_id = insert_payment_in(
            &mut tx,
            PaymentMethod::Card,
            PaymentStatus::Completed,
            total_cents,
            None,
            Some(&sale_id),
            None,
            Some(gateway_reference),
        )
        .await?;

        insert_income_in(&mut tx, &payment_id, total_cents).await?;
        insert_created_audit_in(&mut tx, &payment_id, &draft.sold_by).await?;
        insert_confirmed_audit_in(&mut tx, &payment_id, "gateway", Some(gateway_reference))
            .await?;

        tx.commit().await?;
        info!(sale_id = %sale_id, payment_id = %payment_id, "Card sale finalized");

        self.assemble_sale(&sale_id, &payment_id).await
    }

    async fn assemble_sale(&self, sale_id: &str, payment_id: &str) -> DbResult<SaleCheckout> {
        let sale = sqlx::query_as::<_, LocalSale>("SELECT * FROM local_sales WHERE id = ?1")
            .bind(sale_id)
            .fetch_one(&self.pool)
            .await?;
        let items = sqlx::query_as::<_, SaleItem>(
            "SELECT * FROM sale_items WHERE sale_id = ?1 ORDER BY created_at, id",
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;
        let payment = fetch_payment(&self.pool, payment_id).await?;

        Ok(SaleCheckout::Created {
            sale,
            items,
            payment,
        })
    }
}

// =============================================================================
// Transaction-Scoped Helpers
// =============================================================================

/// Freezes sku, name, and price for each line from the product catalog.
async fn price_lines_in(
    conn: &mut sqlx::SqliteConnection,
    lines: &[SaleLine],
) -> DbResult<Vec<PricedLine>> {
    let mut priced = Vec::with_capacity(lines.len());

    for line in lines {
        let row: Option<(String, String, i64)> =
            sqlx::query_as("SELECT sku, name, price_cents FROM products WHERE id = ?1")
                .bind(&line.product_id)
                .fetch_optional(&mut *conn)
                .await?;

        let (sku, name, price_cents) =
            row.ok_or_else(|| DbError::not_found("Product", &line.product_id))?;

        priced.push(PricedLine {
            product_id: line.product_id.clone(),
            sku,
            name,
            unit_price_cents: price_cents,
            quantity: line.quantity,
            line_total_cents: Money::from_cents(price_cents)
                .multiply_quantity(line.quantity)
                .cents(),
        });
    }

    Ok(priced)
}

/// Inserts the sale row and its priced line items; returns (sale_id, total).
async fn insert_sale_rows_in(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    draft: &SaleDraft,
    status: SaleStatus,
    priced: &[PricedLine],
) -> DbResult<(String, i64)> {
    let sale_id = Uuid::new_v4().to_string();
    let now = Utc::now();
    let total_cents = PricedLine::total(priced).cents();

    sqlx::query(
        r#"
        INSERT INTO local_sales
            (id, status, payment_method, total_cents, sold_by, notes, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
        "#,
    )
    .bind(&sale_id)
    .bind(status)
    .bind(draft.method)
    .bind(total_cents)
    .bind(&draft.sold_by)
    .bind(&draft.notes)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    for line in priced {
        sqlx::query(
            r#"
            INSERT INTO sale_items
                (id, sale_id, product_id, sku_snapshot, name_snapshot,
                 unit_price_cents, quantity, line_total_cents, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&sale_id)
        .bind(&line.product_id)
        .bind(&line.sku)
        .bind(&line.name)
        .bind(line.unit_price_cents)
        .bind(line.quantity)
        .bind(line.line_total_cents)
        .bind(now)
        .execute(&mut **tx)
        .await?;
    }

    Ok((sale_id, total_cents))
}

/// Inserts a payment row; returns its id.
#[allow(clippy::too_many_arguments)]
async fn insert_payment_in(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    method: PaymentMethod,
    status: PaymentStatus,
    amount_cents: i64,
    membership_id: Option<&str>,
    sale_id: Option<&str>,
    proof_reference: Option<&str>,
    gateway_reference: Option<&str>,
) -> DbResult<String> {
    let payment_id = Uuid::new_v4().to_string();
    let now = Utc::now();

    let (decided_by, decided_at) = if status == PaymentStatus::Completed {
        (Some("gateway"), Some(now))
    } else {
        (None, None)
    };

    sqlx::query(
        r#"
        INSERT INTO payments
            (id, method, status, amount_cents, membership_id, sale_id,
             proof_reference, gateway_reference, decided_by, decided_at,
             decision_note, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, NULL, ?11, ?11)
        "#,
    )
    .bind(&payment_id)
    .bind(method)
    .bind(status)
    .bind(amount_cents)
    .bind(membership_id)
    .bind(sale_id)
    .bind(proof_reference)
    .bind(gateway_reference)
    .bind(decided_by)
    .bind(decided_at)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    Ok(payment_id)
}

async fn insert_created_audit_in(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    payment_id: &str,
    actor: &str,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO payment_audit (id, payment_id, action, actor, reason, recorded_at)
        VALUES (?1, ?2, 'created', ?3, NULL, ?4)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(payment_id)
    .bind(actor)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn insert_confirmed_audit_in(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    payment_id: &str,
    actor: &str,
    reason: Option<&str>,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO payment_audit (id, payment_id, action, actor, reason, recorded_at)
        VALUES (?1, ?2, 'confirmed', ?3, ?4, ?5)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(payment_id)
    .bind(actor)
    .bind(reason)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn fetch_membership(pool: &SqlitePool, id: &str) -> DbResult<Membership> {
    Ok(
        sqlx::query_as::<_, Membership>("SELECT * FROM memberships WHERE id = ?1")
            .bind(id)
            .fetch_one(pool)
            .await?,
    )
}

async fn fetch_payment(pool: &SqlitePool, id: &str) -> DbResult<Payment> {
    Ok(
        sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = ?1")
            .bind(id)
            .fetch_one(pool)
            .await?,
    )
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::plan::NewPlan;
    use crate::repository::product::NewProduct;
    use crate::repository::slot::NewSlot;
    use atlas_core::{ConflictResource, Decision, ReservationOutcome, Weekday};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed_plan(db: &Database) -> String {
        seed_plan_with_cap(db, 50).await
    }

    async fn seed_plan_with_cap(db: &Database, total_capacity: i64) -> String {
        db.plans()
            .create(NewPlan {
                name: "Full".to_string(),
                price_cents: 6_000,
                allowed_days: Weekday::ALL.to_vec(),
                max_slots_per_day: 2,
                max_reservations_per_week: 6,
                total_capacity,
            })
            .await
            .unwrap()
            .id
    }

    async fn seed_slot(db: &Database, capacity: i64) -> String {
        db.slots()
            .create(NewSlot {
                weekday: Weekday::Monday,
                opens_at_min: 390,
                closes_at_min: 450,
                capacity,
            })
            .await
            .unwrap()
            .id
    }

    fn membership_draft(plan_id: String, slot_ids: Vec<String>, method: PaymentMethod) -> MembershipDraft {
        MembershipDraft {
            plan_id,
            member_id: "member-1".to_string(),
            slot_ids,
            method,
            amount_cents: 6_000,
            start_date: chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            end_date: Some(chrono::NaiveDate::from_ymd_opt(2026, 1, 31).unwrap()),
            proof_reference: None,
            actor: "staff-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_pending_membership_creates_all_rows() {
        let db = test_db().await;
        let plan_id = seed_plan(&db).await;
        let slot_id = seed_slot(&db, 10).await;

        let outcome = db
            .checkout()
            .create_pending_membership(membership_draft(
                plan_id,
                vec![slot_id.clone()],
                PaymentMethod::Transfer,
            ))
            .await
            .unwrap();

        let (membership, payment) = match outcome {
            MembershipCheckout::Created {
                membership,
                payment,
            } => (membership, payment),
            other => panic!("unexpected: {other:?}"),
        };

        assert_eq!(membership.status, MembershipStatus::PendingTransfer);
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.membership_id.as_deref(), Some(membership.id.as_str()));

        // Reservation held, audit written, no income yet.
        let slot = db.slots().get_by_id(&slot_id).await.unwrap();
        assert_eq!(slot.reserved_count, 1);
        assert!(db.ledger().get_by_payment_id(&payment.id).await.is_err());
        let trail = db.decisions().audit_trail(&payment.id).await.unwrap();
        assert_eq!(trail.len(), 1);
    }

    #[tokio::test]
    async fn test_conflicted_membership_writes_nothing() {
        let db = test_db().await;
        let plan_id = seed_plan(&db).await;
        let full = seed_slot(&db, 1).await;

        // Fill the slot first.
        assert!(db
            .capacity()
            .reserve_slots(&[full.clone()])
            .await
            .unwrap()
            .is_committed());

        let outcome = db
            .checkout()
            .create_pending_membership(membership_draft(
                plan_id,
                vec![full.clone()],
                PaymentMethod::Cash,
            ))
            .await
            .unwrap();

        assert!(matches!(outcome, MembershipCheckout::Conflict(_)));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM memberships")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
        let payments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payments")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(payments, 0);
    }

    #[tokio::test]
    async fn test_card_membership_is_active_with_income() {
        let db = test_db().await;
        let plan_id = seed_plan(&db).await;
        let slot_id = seed_slot(&db, 10).await;

        // Engine path: reserve first, then finalize after the charge.
        assert!(matches!(
            db.capacity()
                .reserve_membership(&plan_id, &[slot_id.clone()])
                .await
                .unwrap(),
            ReservationOutcome::Committed
        ));

        let outcome = db
            .checkout()
            .finalize_card_membership(
                membership_draft(plan_id, vec![slot_id], PaymentMethod::Card),
                "ch_12345",
            )
            .await
            .unwrap();

        let (membership, payment) = match outcome {
            MembershipCheckout::Created {
                membership,
                payment,
            } => (membership, payment),
            other => panic!("unexpected: {other:?}"),
        };

        assert_eq!(membership.status, MembershipStatus::Active);
        assert_eq!(payment.status, PaymentStatus::Completed);
        assert_eq!(payment.gateway_reference.as_deref(), Some("ch_12345"));

        let movement = db.ledger().get_by_payment_id(&payment.id).await.unwrap();
        assert_eq!(movement.amount_cents, 6_000);
    }

    #[tokio::test]
    async fn test_pending_sale_freezes_snapshot_and_decrements_stock() {
        let db = test_db().await;
        let product = db
            .products()
            .create(NewProduct {
                sku: "SHAKE-CHOC".to_string(),
                name: "Chocolate Shake".to_string(),
                price_cents: 350,
                stock_quantity: 5,
                min_stock: 1,
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

        let (sale, items, payment) = match outcome {
            SaleCheckout::Created {
                sale,
                items,
                payment,
            } => (sale, items, payment),
            other => panic!("unexpected: {other:?}"),
        };

        assert_eq!(sale.status, SaleStatus::PendingCash);
        assert_eq!(sale.total_cents, 700);
        assert_eq!(payment.amount_cents, 700);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].sku_snapshot, "SHAKE-CHOC");
        assert_eq!(items[0].line_total_cents, 700);

        // Stock left the shelf at creation time.
        let fresh = db.products().get_by_id(&product.id).await.unwrap();
        assert_eq!(fresh.stock_quantity, 3);
    }

    #[tokio::test]
    async fn test_sale_stock_conflict_writes_nothing() {
        let db = test_db().await;
        let product = db
            .products()
            .create(NewProduct {
                sku: "BAR-1".to_string(),
                name: "Bar".to_string(),
                price_cents: 200,
                stock_quantity: 1,
                min_stock: 0,
            })
            .await
            .unwrap();

        let outcome = db
            .checkout()
            .create_pending_sale(SaleDraft {
                lines: vec![SaleLine {
                    product_id: product.id.clone(),
                    quantity: 3,
                }],
                method: PaymentMethod::Transfer,
                proof_reference: None,
                sold_by: "staff-1".to_string(),
                notes: None,
            })
            .await
            .unwrap();

        assert!(matches!(outcome, SaleCheckout::Conflict(_)));
        let fresh = db.products().get_by_id(&product.id).await.unwrap();
        assert_eq!(fresh.stock_quantity, 1);
        let sales: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM local_sales")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(sales, 0);
    }

    #[tokio::test]
    async fn test_plan_member_cap_holds_until_a_seat_frees() {
        let db = test_db().await;
        let plan_id = seed_plan_with_cap(&db, 1).await;
        let slot_id = seed_slot(&db, 10).await;

        let first = db
            .checkout()
            .create_pending_membership(membership_draft(
                plan_id.clone(),
                vec![slot_id.clone()],
                PaymentMethod::Cash,
            ))
            .await
            .unwrap();
        let payment = match first {
            MembershipCheckout::Created { payment, .. } => payment,
            other => panic!("unexpected: {other:?}"),
        };

        // The cap is one; the second purchase must lose the claim even
        // though the slot still has room.
        let second = db
            .checkout()
            .create_pending_membership(membership_draft(
                plan_id.clone(),
                vec![slot_id.clone()],
                PaymentMethod::Cash,
            ))
            .await
            .unwrap();
        match second {
            MembershipCheckout::Conflict(conflicts) => {
                assert_eq!(conflicts.len(), 1);
                assert!(matches!(
                    conflicts[0].resource,
                    ConflictResource::Plan { .. }
                ));
            }
            other => panic!("unexpected: {other:?}"),
        }

        // Cancelling the first purchase frees the seat again.
        db.decisions()
            .apply(
                &payment.id,
                &Decision::Cancel {
                    reason: "changed their mind".to_string(),
                },
                "staff-1",
            )
            .await
            .unwrap();

        let third = db
            .checkout()
            .create_pending_membership(membership_draft(
                plan_id,
                vec![slot_id],
                PaymentMethod::Cash,
            ))
            .await
            .unwrap();
        assert!(matches!(third, MembershipCheckout::Created { .. }));
    }

    #[tokio::test]
    async fn test_card_sale_records_the_charged_total_across_a_price_change() {
        let db = test_db().await;
        let product = db
            .products()
            .create(NewProduct {
                sku: "SHAKE-CHOC".to_string(),
                name: "Chocolate Shake".to_string(),
                price_cents: 350,
                stock_quantity: 5,
                min_stock: 1,
            })
            .await
            .unwrap();
        let draft = SaleDraft {
            lines: vec![SaleLine {
                product_id: product.id.clone(),
                quantity: 2,
            }],
            method: PaymentMethod::Card,
            proof_reference: None,
            sold_by: "staff-1".to_string(),
            notes: None,
        };

        // Engine path: reserve, price, charge the gateway, finalize.
        assert!(db
            .capacity()
            .reserve_stock(&[(product.id.clone(), 2)])
            .await
            .unwrap()
            .is_committed());
        let priced = db.checkout().price_sale(&draft.lines).await.unwrap();
        assert_eq!(PricedLine::total(&priced).cents(), 700);

        // The price changes while the charge is in flight.
        sqlx::query("UPDATE products SET price_cents = 500 WHERE id = ?1")
            .bind(&product.id)
            .execute(db.pool())
            .await
            .unwrap();

        let outcome = db
            .checkout()
            .finalize_card_sale(draft, &priced, "ch_777")
            .await
            .unwrap();
        let (sale, items, payment) = match outcome {
            SaleCheckout::Created {
                sale,
                items,
                payment,
            } => (sale, items, payment),
            other => panic!("unexpected: {other:?}"),
        };

        // Recorded exactly what was charged, not the new catalog price.
        assert_eq!(sale.total_cents, 700);
        assert_eq!(payment.amount_cents, 700);
        assert_eq!(items[0].unit_price_cents, 350);
        assert_eq!(items[0].line_total(), Money::from_cents(700));
    }

    #[tokio::test]
    async fn test_card_draft_refused_on_pending_path() {
        let db = test_db().await;
        let plan_id = seed_plan(&db).await;
        let slot_id = seed_slot(&db, 10).await;

        let err = db
            .checkout()
            .create_pending_membership(membership_draft(
                plan_id,
                vec![slot_id],
                PaymentMethod::Card,
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Internal(_)));
    }
}
