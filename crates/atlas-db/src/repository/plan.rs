//! # Plan Repository
//!
//! Database operations for membership plans.
//!
//! `allowed_days` is stored as a JSON array of weekday names; this module
//! owns the (de)serialization so the rest of the system only ever sees
//! `Vec<Weekday>`.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use atlas_core::validation::validate_amount_cents;
use atlas_core::{Plan, Weekday};

/// Input for creating a plan.
#[derive(Debug, Clone)]
pub struct NewPlan {
    pub name: String,
    pub price_cents: i64,
    pub allowed_days: Vec<Weekday>,
    pub max_slots_per_day: i64,
    pub max_reservations_per_week: i64,
    pub total_capacity: i64,
}

/// Row shape as persisted; `allowed_days` is raw JSON.
#[derive(Debug, sqlx::FromRow)]
struct PlanRow {
    id: String,
    name: String,
    price_cents: i64,
    allowed_days: String,
    max_slots_per_day: i64,
    max_reservations_per_week: i64,
    total_capacity: i64,
    member_count: i64,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl PlanRow {
    fn into_plan(self) -> DbResult<Plan> {
        let allowed_days: Vec<Weekday> = serde_json::from_str(&self.allowed_days)
            .map_err(|e| DbError::Internal(format!("corrupt allowed_days JSON: {e}")))?;
        Ok(Plan {
            id: self.id,
            name: self.name,
            price_cents: self.price_cents,
            allowed_days,
            max_slots_per_day: self.max_slots_per_day,
            max_reservations_per_week: self.max_reservations_per_week,
            total_capacity: self.total_capacity,
            member_count: self.member_count,
            is_active: self.is_active,
            created_at: self.created_at,
        })
    }
}

/// Repository for plan database operations.
#[derive(Debug, Clone)]
pub struct PlanRepository {
    pool: SqlitePool,
}

impl PlanRepository {
    /// Creates a new PlanRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PlanRepository { pool }
    }

    /// Creates a new plan.
    ///
    /// The price must be strictly positive: a purchase of this plan becomes
    /// a payment, and a payment cannot move zero money.
    pub async fn create(&self, new: NewPlan) -> DbResult<Plan> {
        validate_amount_cents(new.price_cents)
            .map_err(|e| DbError::InvalidInput(format!("price_cents: {e}")))?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let allowed_days_json = serde_json::to_string(&new.allowed_days)
            .map_err(|e| DbError::Internal(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO plans
                (id, name, price_cents, allowed_days, max_slots_per_day,
                 max_reservations_per_week, total_capacity, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8)
            "#,
        )
        .bind(&id)
        .bind(&new.name)
        .bind(new.price_cents)
        .bind(&allowed_days_json)
        .bind(new.max_slots_per_day)
        .bind(new.max_reservations_per_week)
        .bind(new.total_capacity)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(plan_id = %id, name = %new.name, "Plan created");
        self.get_by_id(&id).await
    }

    /// Gets a plan by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Plan> {
        let row = sqlx::query_as::<_, PlanRow>("SELECT * FROM plans WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Plan", id))?;

        row.into_plan()
    }

    /// Lists active plans, name order.
    pub async fn list_active(&self) -> DbResult<Vec<Plan>> {
        let rows =
            sqlx::query_as::<_, PlanRow>("SELECT * FROM plans WHERE is_active = 1 ORDER BY name")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(PlanRow::into_plan).collect()
    }

    /// Deactivates a plan (soft delete). Existing memberships keep their
    /// reference; new purchases no longer see it.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE plans SET is_active = 0 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Plan", id));
        }
        debug!(plan_id = %id, "Plan deactivated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn weekday_plan() -> NewPlan {
        NewPlan {
            name: "Mornings Only".to_string(),
            price_cents: 4_500,
            allowed_days: vec![Weekday::Monday, Weekday::Wednesday, Weekday::Friday],
            max_slots_per_day: 1,
            max_reservations_per_week: 3,
            total_capacity: 100,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_roundtrips_allowed_days() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let plan = db.plans().create(weekday_plan()).await.unwrap();

        let fetched = db.plans().get_by_id(&plan.id).await.unwrap();
        assert_eq!(fetched.allowed_days, plan.allowed_days);
        assert!(fetched.allows_day(Weekday::Wednesday));
        assert!(!fetched.allows_day(Weekday::Sunday));
    }

    #[tokio::test]
    async fn test_zero_price_plan_is_refused() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut free = weekday_plan();
        free.price_cents = 0;

        let err = db.plans().create(free).await.unwrap_err();
        assert!(matches!(err, DbError::InvalidInput(_)));
        assert!(db.plans().list_active().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deactivated_plan_leaves_active_list() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let plan = db.plans().create(weekday_plan()).await.unwrap();

        assert_eq!(db.plans().list_active().await.unwrap().len(), 1);
        db.plans().deactivate(&plan.id).await.unwrap();
        assert!(db.plans().list_active().await.unwrap().is_empty());

        // Still reachable by id for existing memberships.
        assert!(!db.plans().get_by_id(&plan.id).await.unwrap().is_active);
    }
}
