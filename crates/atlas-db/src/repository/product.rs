//! # Product Repository
//!
//! Database operations for front-desk retail products.
//!
//! Stock mutations do NOT live here - a sale reserves stock through the
//! capacity repository so the conditional-UPDATE discipline applies to
//! products and schedule slots alike.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use atlas_core::validation::validate_amount_cents;
use atlas_core::Product;

/// Input for creating a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub price_cents: i64,
    pub stock_quantity: i64,
    pub min_stock: i64,
}

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Creates a product. SKU must be unique, price strictly positive.
    pub async fn create(&self, new: NewProduct) -> DbResult<Product> {
        validate_amount_cents(new.price_cents)
            .map_err(|e| DbError::InvalidInput(format!("price_cents: {e}")))?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO products
                (id, sku, name, price_cents, stock_quantity, min_stock, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?7)
            "#,
        )
        .bind(&id)
        .bind(&new.sku)
        .bind(&new.name)
        .bind(new.price_cents)
        .bind(new.stock_quantity)
        .bind(new.min_stock)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(product_id = %id, sku = %new.sku, "Product created");
        self.get_by_id(&id).await
    }

    /// Gets a product by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Product> {
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Gets a product by SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Product> {
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE sku = ?1")
            .bind(sku)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Product", sku))
    }

    /// Lists active products, name order.
    pub async fn list_active(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE is_active = 1 ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Lists active products at or below their restock threshold.
    pub async fn list_low_stock(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM products
            WHERE is_active = 1 AND stock_quantity <= min_stock
            ORDER BY stock_quantity ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Receives new stock (restock delivery). Adds to the current quantity.
    pub async fn receive_stock(&self, id: &str, quantity: i64) -> DbResult<Product> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity + ?2,
                updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(quantity)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        debug!(product_id = %id, quantity, "Stock received");
        self.get_by_id(id).await
    }
}
