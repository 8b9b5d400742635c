//! # Balance Repository
//!
//! Read access to the balance store. One row per (product, warehouse),
//! created by the first movement and never deleted.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use depot_core::{BalanceKey, StockBalance};

const BALANCE_COLUMNS: &str =
    "product_id, warehouse_id, quantity, reserved_quantity, location, updated_at";

/// Repository for balance reads.
#[derive(Debug, Clone)]
pub struct BalanceRepository {
    pool: SqlitePool,
}

impl BalanceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        BalanceRepository { pool }
    }

    /// Gets the balance row for a key, if it has ever moved.
    pub async fn get(&self, key: &BalanceKey) -> DbResult<Option<StockBalance>> {
        let sql = format!(
            "SELECT {BALANCE_COLUMNS} FROM stock_balances WHERE product_id = ?1 AND warehouse_id = ?2"
        );

        let balance = sqlx::query_as::<_, StockBalance>(&sql)
            .bind(&key.product_id)
            .bind(&key.warehouse_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(balance)
    }

    /// Gets the rows for several keys over one connection.
    ///
    /// Keys without a row are absent from the result.
    pub async fn get_many(&self, keys: &[BalanceKey]) -> DbResult<Vec<StockBalance>> {
        let sql = format!(
            "SELECT {BALANCE_COLUMNS} FROM stock_balances WHERE product_id = ?1 AND warehouse_id = ?2"
        );

        let mut conn = self.pool.acquire().await?;
        let mut balances = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(balance) = sqlx::query_as::<_, StockBalance>(&sql)
                .bind(&key.product_id)
                .bind(&key.warehouse_id)
                .fetch_optional(&mut *conn)
                .await?
            {
                balances.push(balance);
            }
        }

        debug!(requested = keys.len(), found = balances.len(), "Loaded balances");
        Ok(balances)
    }

    /// Every balance row of a warehouse, ordered by product.
    pub async fn list_by_warehouse(&self, warehouse_id: &str) -> DbResult<Vec<StockBalance>> {
        let sql = format!(
            "SELECT {BALANCE_COLUMNS} FROM stock_balances WHERE warehouse_id = ?1 ORDER BY product_id"
        );

        let balances = sqlx::query_as::<_, StockBalance>(&sql)
            .bind(warehouse_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(balances)
    }

    /// Every balance row of a product across warehouses.
    pub async fn list_by_product(&self, product_id: &str) -> DbResult<Vec<StockBalance>> {
        let sql = format!(
            "SELECT {BALANCE_COLUMNS} FROM stock_balances WHERE product_id = ?1 ORDER BY warehouse_id"
        );

        let balances = sqlx::query_as::<_, StockBalance>(&sql)
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(balances)
    }

    /// Total on-hand quantity of a product across all warehouses.
    pub async fn total_for_product(&self, product_id: &str) -> DbResult<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity), 0) FROM stock_balances WHERE product_id = ?1",
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }
}
