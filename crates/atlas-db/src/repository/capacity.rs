//! # Capacity Ledger Repository
//!
//! The guarded reserve/release statements for schedule slots, product
//! stock, and plan member caps. Everything that moves `reserved_count`,
//! `stock_quantity`, or `member_count` goes through this module.
//!
//! ## Check-Then-Commit
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │            All-or-Nothing Reservation (one transaction)                 │
//! │                                                                         │
//! │  For each requested unit:                                              │
//! │                                                                         │
//! │    UPDATE schedule_slots                                               │
//! │    SET    reserved_count = reserved_count + 1                          │
//! │    WHERE  id = ?1 AND reserved_count < capacity                        │
//! │                                                                         │
//! │    rows_affected == 1  → unit committed                                │
//! │    rows_affected == 0  → record a conflict, keep scanning              │
//! │                                                                         │
//! │  Any conflict at the end → the caller ROLLS BACK the transaction.      │
//! │  The conflict list reports every failed unit, not just the first.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The condition inside the UPDATE is what makes this safe under
//! concurrency: two racing transactions both pass any earlier SELECT, but
//! only one of them can win the last unit, because the condition is
//! re-evaluated under SQLite's write lock.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use atlas_core::{CapacityConflict, ConflictResource, ReservationOutcome, Weekday};

/// Repository for capacity ledger mutations.
///
/// The public methods run their own transaction; the `*_in` variants are
/// used by the checkout and decision repositories to compose reservation
/// into a larger atomic unit.
#[derive(Debug, Clone)]
pub struct CapacityRepository {
    pool: SqlitePool,
}

impl CapacityRepository {
    /// Creates a new CapacityRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CapacityRepository { pool }
    }

    /// Reserves one unit in each of the given slots, all-or-nothing.
    ///
    /// ## Returns
    /// - `Committed` - every slot had room; all counters were incremented
    /// - `Conflict(list)` - at least one slot was full; NOTHING was changed,
    ///   and the list names every slot that failed
    pub async fn reserve_slots(&self, slot_ids: &[String]) -> DbResult<ReservationOutcome> {
        let mut tx = self.pool.begin().await?;

        let conflicts = reserve_slots_in(&mut tx, slot_ids).await?;

        if conflicts.is_empty() {
            tx.commit().await?;
            debug!(slots = slot_ids.len(), "Slot reservation committed");
            Ok(ReservationOutcome::Committed)
        } else {
            tx.rollback().await?;
            debug!(conflicts = conflicts.len(), "Slot reservation rolled back");
            Ok(ReservationOutcome::Conflict(conflicts))
        }
    }

    /// Releases one unit in each of the given slots.
    ///
    /// Used as compensation when a pending purchase is rejected or
    /// cancelled, and when a card charge fails after its reservation.
    pub async fn release_slots(&self, slot_ids: &[String]) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        release_slots_in(&mut tx, slot_ids).await?;
        tx.commit().await?;
        debug!(slots = slot_ids.len(), "Slot reservation released");
        Ok(())
    }

    /// Reserves stock for each (product_id, quantity) line, all-or-nothing.
    pub async fn reserve_stock(&self, lines: &[(String, i64)]) -> DbResult<ReservationOutcome> {
        let mut tx = self.pool.begin().await?;

        let conflicts = reserve_stock_in(&mut tx, lines).await?;

        if conflicts.is_empty() {
            tx.commit().await?;
            debug!(lines = lines.len(), "Stock reservation committed");
            Ok(ReservationOutcome::Committed)
        } else {
            tx.rollback().await?;
            debug!(conflicts = conflicts.len(), "Stock reservation rolled back");
            Ok(ReservationOutcome::Conflict(conflicts))
        }
    }

    /// Restores stock for each (product_id, quantity) line.
    pub async fn release_stock(&self, lines: &[(String, i64)]) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        release_stock_in(&mut tx, lines).await?;
        tx.commit().await?;
        debug!(lines = lines.len(), "Stock restored");
        Ok(())
    }

    /// Reserves a membership: the weekly slots plus one seat against the
    /// plan's member cap, in one transaction, all-or-nothing.
    ///
    /// The card flow calls this before charging the gateway; the claim is
    /// what stops two concurrent purchases from overshooting the cap.
    pub async fn reserve_membership(
        &self,
        plan_id: &str,
        slot_ids: &[String],
    ) -> DbResult<ReservationOutcome> {
        let mut tx = self.pool.begin().await?;

        let mut conflicts = reserve_slots_in(&mut tx, slot_ids).await?;
        if let Some(conflict) = claim_plan_in(&mut tx, plan_id).await? {
            conflicts.push(conflict);
        }

        if conflicts.is_empty() {
            tx.commit().await?;
            debug!(plan_id = %plan_id, slots = slot_ids.len(), "Membership reservation committed");
            Ok(ReservationOutcome::Committed)
        } else {
            tx.rollback().await?;
            debug!(conflicts = conflicts.len(), "Membership reservation rolled back");
            Ok(ReservationOutcome::Conflict(conflicts))
        }
    }

    /// Releases a membership reservation: the slots and the plan seat.
    ///
    /// Compensation for a failed card charge after [`reserve_membership`].
    pub async fn release_membership(&self, plan_id: &str, slot_ids: &[String]) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        release_slots_in(&mut tx, slot_ids).await?;
        release_plan_in(&mut tx, plan_id).await?;
        tx.commit().await?;
        debug!(plan_id = %plan_id, slots = slot_ids.len(), "Membership reservation released");
        Ok(())
    }
}

// =============================================================================
// Transaction-Scoped Primitives
// =============================================================================

/// Increments `reserved_count` for each slot where room remains.
///
/// Returns the conflict list; an empty list means every increment landed.
/// On a non-empty list the caller MUST roll back - the successful
/// increments are not undone here.
pub(crate) async fn reserve_slots_in(
    conn: &mut SqliteConnection,
    slot_ids: &[String],
) -> DbResult<Vec<CapacityConflict>> {
    let mut conflicts = Vec::new();

    for slot_id in slot_ids {
        let result = sqlx::query(
            r#"
            UPDATE schedule_slots
            SET reserved_count = reserved_count + 1
            WHERE id = ?1 AND reserved_count < capacity
            "#,
        )
        .bind(slot_id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            // Full, or the id doesn't exist. Look to tell the two apart.
            let row: Option<(String, i64, i64)> = sqlx::query_as(
                "SELECT weekday, capacity, reserved_count FROM schedule_slots WHERE id = ?1",
            )
            .bind(slot_id)
            .fetch_optional(&mut *conn)
            .await?;

            match row {
                Some((weekday, capacity, reserved)) => {
                    let weekday: Weekday = weekday
                        .parse()
                        .map_err(|e: String| DbError::Internal(e))?;
                    conflicts.push(CapacityConflict {
                        resource: ConflictResource::Slot {
                            slot_id: slot_id.clone(),
                            weekday,
                        },
                        requested: 1,
                        available: (capacity - reserved).max(0),
                    });
                }
                None => return Err(DbError::not_found("ScheduleSlot", slot_id)),
            }
        }
    }

    Ok(conflicts)
}

/// Decrements `reserved_count` for each slot.
///
/// A decrement that finds `reserved_count = 0` means a release without a
/// matching reserve; that is corruption and fails loudly.
pub(crate) async fn release_slots_in(
    conn: &mut SqliteConnection,
    slot_ids: &[String],
) -> DbResult<()> {
    for slot_id in slot_ids {
        let result = sqlx::query(
            r#"
            UPDATE schedule_slots
            SET reserved_count = reserved_count - 1
            WHERE id = ?1 AND reserved_count > 0
            "#,
        )
        .bind(slot_id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::CounterUnderflow(format!(
                "release on slot {slot_id} with no matching reserve"
            )));
        }
    }
    Ok(())
}

/// Decrements `stock_quantity` by the line quantity where enough remains.
///
/// Same contract as [`reserve_slots_in`]: non-empty conflicts → roll back.
pub(crate) async fn reserve_stock_in(
    conn: &mut SqliteConnection,
    lines: &[(String, i64)],
) -> DbResult<Vec<CapacityConflict>> {
    let mut conflicts = Vec::new();

    for (product_id, quantity) in lines {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity - ?2,
                updated_at = datetime('now')
            WHERE id = ?1 AND stock_quantity >= ?2
            "#,
        )
        .bind(product_id)
        .bind(quantity)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            let row: Option<(String, i64)> =
                sqlx::query_as("SELECT sku, stock_quantity FROM products WHERE id = ?1")
                    .bind(product_id)
                    .fetch_optional(&mut *conn)
                    .await?;

            match row {
                Some((sku, stock)) => conflicts.push(CapacityConflict {
                    resource: ConflictResource::Product {
                        product_id: product_id.clone(),
                        sku,
                    },
                    requested: *quantity,
                    available: stock,
                }),
                None => return Err(DbError::not_found("Product", product_id)),
            }
        }
    }

    Ok(conflicts)
}

/// Restores `stock_quantity` by the line quantity.
pub(crate) async fn release_stock_in(
    conn: &mut SqliteConnection,
    lines: &[(String, i64)],
) -> DbResult<()> {
    for (product_id, quantity) in lines {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity + ?2,
                updated_at = datetime('now')
            WHERE id = ?1
            "#,
        )
        .bind(product_id)
        .bind(quantity)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", product_id));
        }
    }
    Ok(())
}

/// Claims one seat against the plan's member cap.
///
/// Returns `Some(conflict)` when the plan is full; the caller rolls back.
pub(crate) async fn claim_plan_in(
    conn: &mut SqliteConnection,
    plan_id: &str,
) -> DbResult<Option<CapacityConflict>> {
    let result = sqlx::query(
        r#"
        UPDATE plans
        SET member_count = member_count + 1
        WHERE id = ?1 AND member_count < total_capacity
        "#,
    )
    .bind(plan_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 1 {
        return Ok(None);
    }

    let row: Option<(i64, i64)> =
        sqlx::query_as("SELECT member_count, total_capacity FROM plans WHERE id = ?1")
            .bind(plan_id)
            .fetch_optional(&mut *conn)
            .await?;

    match row {
        Some((member_count, total_capacity)) => Ok(Some(CapacityConflict {
            resource: ConflictResource::Plan {
                plan_id: plan_id.to_string(),
            },
            requested: 1,
            available: (total_capacity - member_count).max(0),
        })),
        None => Err(DbError::not_found("Plan", plan_id)),
    }
}

/// Returns one seat to the plan's member cap.
///
/// A release that finds `member_count = 0` is corruption and fails loudly.
pub(crate) async fn release_plan_in(conn: &mut SqliteConnection, plan_id: &str) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE plans
        SET member_count = member_count - 1
        WHERE id = ?1 AND member_count > 0
        "#,
    )
    .bind(plan_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::CounterUnderflow(format!(
            "release on plan {plan_id} with no matching claim"
        )));
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
