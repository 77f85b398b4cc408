//! # Schedule Slot Repository
//!
//! Database operations for the weekly schedule template. Reads only -
//! `reserved_count` is mutated exclusively through the capacity repository.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use atlas_core::{ScheduleSlot, Weekday};

/// Input for creating a schedule slot.
#[derive(Debug, Clone)]
pub struct NewSlot {
    pub weekday: Weekday,
    /// Minutes since midnight.
    pub opens_at_min: i64,
    pub closes_at_min: i64,
    pub capacity: i64,
}

/// Repository for schedule slot database operations.
#[derive(Debug, Clone)]
pub struct SlotRepository {
    pool: SqlitePool,
}

impl SlotRepository {
    /// Creates a new SlotRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SlotRepository { pool }
    }

    /// Creates a schedule slot with `reserved_count = 0`.
    pub async fn create(&self, new: NewSlot) -> DbResult<ScheduleSlot> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO schedule_slots
                (id, weekday, opens_at_min, closes_at_min, capacity, reserved_count, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)
            "#,
        )
        .bind(&id)
        .bind(new.weekday)
        .bind(new.opens_at_min)
        .bind(new.closes_at_min)
        .bind(new.capacity)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(slot_id = %id, weekday = %new.weekday, "Schedule slot created");
        self.get_by_id(&id).await
    }

    /// Gets a slot by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<ScheduleSlot> {
        sqlx::query_as::<_, ScheduleSlot>("SELECT * FROM schedule_slots WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("ScheduleSlot", id))
    }

    /// Fetches all slots for the given ids, preserving no particular order.
    ///
    /// Errors if any id is missing, so callers never silently operate on a
    /// partial selection.
    pub async fn get_many(&self, ids: &[String]) -> DbResult<Vec<ScheduleSlot>> {
        let mut slots = Vec::with_capacity(ids.len());
        for id in ids {
            slots.push(self.get_by_id(id).await?);
        }
        Ok(slots)
    }

    /// Lists the whole weekly template, ordered for display.
    pub async fn list_all(&self) -> DbResult<Vec<ScheduleSlot>> {
        let slots = sqlx::query_as::<_, ScheduleSlot>(
            r#"
            SELECT * FROM schedule_slots
            ORDER BY
                CASE weekday
                    WHEN 'monday'    THEN 0
                    WHEN 'tuesday'   THEN 1
                    WHEN 'wednesday' THEN 2
                    WHEN 'thursday'  THEN 3
                    WHEN 'friday'    THEN 4
                    WHEN 'saturday'  THEN 5
                    WHEN 'sunday'    THEN 6
                END,
                opens_at_min,
                id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(slots)
    }

    /// Lists slots for one weekday, earliest first.
    pub async fn list_for_weekday(&self, weekday: Weekday) -> DbResult<Vec<ScheduleSlot>> {
        let slots = sqlx::query_as::<_, ScheduleSlot>(
            "SELECT * FROM schedule_slots WHERE weekday = ?1 ORDER BY opens_at_min, id",
        )
        .bind(weekday)
        .fetch_all(&self.pool)
        .await?;

        Ok(slots)
    }
}
