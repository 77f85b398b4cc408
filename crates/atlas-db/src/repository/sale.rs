//! # Sale Repository
//!
//! Read-side database operations for local sales. Creation goes through
//! the checkout repository; status transitions through decisions.

use sqlx::SqlitePool;

use crate::error::{DbError, DbResult};
use atlas_core::{LocalSale, SaleItem, SaleStatus};

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<LocalSale> {
        sqlx::query_as::<_, LocalSale>("SELECT * FROM local_sales WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("LocalSale", id))
    }

    /// The frozen line items of a sale.
    pub async fn items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(
            "SELECT * FROM sale_items WHERE sale_id = ?1 ORDER BY created_at, id",
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Lists recent sales, newest first.
    pub async fn list_recent(&self, limit: u32) -> DbResult<Vec<LocalSale>> {
        let sales = sqlx::query_as::<_, LocalSale>(
            "SELECT * FROM local_sales ORDER BY created_at DESC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Lists sales in a given status, oldest first (the staff work queue).
    pub async fn list_by_status(&self, status: SaleStatus) -> DbResult<Vec<LocalSale>> {
        let sales = sqlx::query_as::<_, LocalSale>(
            "SELECT * FROM local_sales WHERE status = ?1 ORDER BY created_at ASC",
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }
}
