//! # Membership Repository
//!
//! Read-side database operations for memberships.
//!
//! Memberships are only ever CREATED through the checkout repository and
//! only ever change status through the decision repository (or the expiry
//! sweep below) - there is no general update here on purpose.

use chrono::NaiveDate;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use atlas_core::{Membership, MembershipStatus, ScheduleSlot};

/// Repository for membership database operations.
#[derive(Debug, Clone)]
pub struct MembershipRepository {
    pool: SqlitePool,
}

impl MembershipRepository {
    /// Creates a new MembershipRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MembershipRepository { pool }
    }

    /// Gets a membership by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Membership> {
        sqlx::query_as::<_, Membership>("SELECT * FROM memberships WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Membership", id))
    }

    /// The slot ids reserved by a membership.
    pub async fn slot_ids(&self, membership_id: &str) -> DbResult<Vec<String>> {
        let ids: Vec<(String,)> =
            sqlx::query_as("SELECT slot_id FROM membership_slots WHERE membership_id = ?1")
                .bind(membership_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    /// The reserved weekly schedule of a membership, display order.
    pub async fn schedule(&self, membership_id: &str) -> DbResult<Vec<ScheduleSlot>> {
        let slots = sqlx::query_as::<_, ScheduleSlot>(
            r#"
            SELECT s.*
            FROM schedule_slots s
            INNER JOIN membership_slots ms ON ms.slot_id = s.id
            WHERE ms.membership_id = ?1
            ORDER BY
                CASE s.weekday
                    WHEN 'monday'    THEN 0
                    WHEN 'tuesday'   THEN 1
                    WHEN 'wednesday' THEN 2
                    WHEN 'thursday'  THEN 3
                    WHEN 'friday'    THEN 4
                    WHEN 'saturday'  THEN 5
                    WHEN 'sunday'    THEN 6
                END,
                s.opens_at_min
            "#,
        )
        .bind(membership_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(slots)
    }

    /// Lists memberships of one member, newest first.
    pub async fn list_by_member(&self, member_id: &str) -> DbResult<Vec<Membership>> {
        let memberships = sqlx::query_as::<_, Membership>(
            "SELECT * FROM memberships WHERE member_id = ?1 ORDER BY created_at DESC",
        )
        .bind(member_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(memberships)
    }

    /// Lists memberships in a given status, oldest first.
    pub async fn list_by_status(&self, status: MembershipStatus) -> DbResult<Vec<Membership>> {
        let memberships = sqlx::query_as::<_, Membership>(
            "SELECT * FROM memberships WHERE status = ?1 ORDER BY created_at ASC",
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(memberships)
    }

    /// Expires active memberships whose term ended before `today`, releasing
    /// their reserved slots and plan seats. One transaction per membership so
    /// a failure never leaves a half-expired row.
    pub async fn expire_overdue(&self, today: NaiveDate) -> DbResult<u64> {
        let due: Vec<(String, String)> = sqlx::query_as(
            "SELECT id, plan_id FROM memberships WHERE status = 'active' AND end_date IS NOT NULL AND end_date < ?1",
        )
        .bind(today)
        .fetch_all(&self.pool)
        .await?;

        let mut expired = 0u64;
        for (id, plan_id) in due {
            let mut tx = self.pool.begin().await?;

            let result = sqlx::query(
                r#"
                UPDATE memberships
                SET status = 'expired', updated_at = datetime('now')
                WHERE id = ?1 AND status = 'active'
                "#,
            )
            .bind(&id)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                // Raced with a cancellation; nothing to do.
                tx.rollback().await?;
                continue;
            }

            let slot_ids: Vec<(String,)> =
                sqlx::query_as("SELECT slot_id FROM membership_slots WHERE membership_id = ?1")
                    .bind(&id)
                    .fetch_all(&mut *tx)
                    .await?;
            let slot_ids: Vec<String> = slot_ids.into_iter().map(|(s,)| s).collect();
            crate::repository::capacity::release_slots_in(&mut tx, &slot_ids).await?;
            crate::repository::capacity::release_plan_in(&mut tx, &plan_id).await?;

            tx.commit().await?;
            debug!(membership_id = %id, "Membership expired");
            expired += 1;
        }

        if expired > 0 {
            info!(count = expired, "Expiry sweep complete");
        }
        Ok(expired)
    }
}
