//! # Catalog Repository
//!
//! Products and warehouses. Read-only from the ledger's point of view.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use depot_core::{Product, ProductThresholds, Warehouse};

const PRODUCT_COLUMNS: &str = "id, sku, name, unit_of_measure, reorder_point, min_stock_level, \
     max_stock_level, unit_cost_cents, unit_price_cents, is_active, created_at";

/// Fields needed to register a product.
#[derive(Debug, Clone, Default)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub unit_of_measure: String,
    pub thresholds: ProductThresholds,
    pub unit_cost_cents: i64,
    pub unit_price_cents: i64,
}

/// Repository for product and warehouse master data.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    pub async fn get_product(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");

        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    pub async fn get_product_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = ?1");

        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(sku)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    pub async fn get_warehouse(&self, id: &str) -> DbResult<Option<Warehouse>> {
        let warehouse = sqlx::query_as::<_, Warehouse>(
            "SELECT id, code, name, is_active FROM warehouses WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(warehouse)
    }

    pub async fn list_warehouses(&self) -> DbResult<Vec<Warehouse>> {
        let warehouses = sqlx::query_as::<_, Warehouse>(
            "SELECT id, code, name, is_active FROM warehouses ORDER BY code",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(warehouses)
    }

    pub async fn count_products(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Registers a product with a generated id.
    pub async fn insert_product(&self, new: &NewProduct) -> DbResult<Product> {
        let product = Product {
            id: uuid::Uuid::new_v4().to_string(),
            sku: new.sku.clone(),
            name: new.name.clone(),
            unit_of_measure: if new.unit_of_measure.is_empty() {
                "each".to_string()
            } else {
                new.unit_of_measure.clone()
            },
            reorder_point: new.thresholds.reorder_point,
            min_stock_level: new.thresholds.min_stock_level,
            max_stock_level: new.thresholds.max_stock_level,
            unit_cost_cents: new.unit_cost_cents,
            unit_price_cents: new.unit_price_cents,
            is_active: true,
            created_at: Utc::now(),
        };

        debug!(id = %product.id, sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, unit_of_measure,
                reorder_point, min_stock_level, max_stock_level,
                unit_cost_cents, unit_price_cents, is_active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.unit_of_measure)
        .bind(product.reorder_point)
        .bind(product.min_stock_level)
        .bind(product.max_stock_level)
        .bind(product.unit_cost_cents)
        .bind(product.unit_price_cents)
        .bind(product.is_active)
        .bind(product.created_at)
        .execute(&self.pool)
        .await?;

        Ok(product)
    }

    /// Registers an active warehouse with a generated id.
    pub async fn insert_warehouse(&self, code: &str, name: &str) -> DbResult<Warehouse> {
        let warehouse = Warehouse {
            id: uuid::Uuid::new_v4().to_string(),
            code: code.to_string(),
            name: name.to_string(),
            is_active: true,
        };

        debug!(id = %warehouse.id, code = %warehouse.code, "Inserting warehouse");

        sqlx::query("INSERT INTO warehouses (id, code, name, is_active) VALUES (?1, ?2, ?3, ?4)")
            .bind(&warehouse.id)
            .bind(&warehouse.code)
            .bind(&warehouse.name)
            .bind(warehouse.is_active)
            .execute(&self.pool)
            .await?;

        Ok(warehouse)
    }

    pub async fn set_warehouse_active(&self, id: &str, active: bool) -> DbResult<()> {
        let result = sqlx::query("UPDATE warehouses SET is_active = ?2 WHERE id = ?1")
            .bind(id)
            .bind(active)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Warehouse", id));
        }

        Ok(())
    }
}
