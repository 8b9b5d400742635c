//! # Movement Repository
//!
//! Audit queries over the append-only movement log.
//!
//! ```text
//!   id  key     type          delta  before  after  correlation
//!   ──  ──────  ────────────  ─────  ──────  ─────  ───────────
//!   41  P1@W1   receipt         +10       0     10
//!   42  P1@W1   transfer-out     -4      10      6  t-7f3a
//!   43  P1@W2   transfer-in      +4       0      4  t-7f3a
//!   44  P1@W1   adjustment       -1       6      5
//! ```
//!
//! Rows are never updated or deleted (enforced by triggers).

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::DbResult;
use depot_core::{BalanceKey, MovementEntry};

const MOVEMENT_COLUMNS: &str = "id, product_id, warehouse_id, movement_type, quantity_delta, \
     balance_before, balance_after, reason, notes, actor_id, correlation_id, reference_id, \
     occurred_at";

/// A balance row whose stored quantity disagrees with its movement log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BalanceDrift {
    pub product_id: String,
    pub warehouse_id: String,
    pub stored_quantity: i64,
    pub log_quantity: i64,
}

impl BalanceDrift {
    pub fn key(&self) -> BalanceKey {
        BalanceKey::new(&self.product_id, &self.warehouse_id)
    }

    /// `stored - log`; positive means the cache claims more than the log.
    pub fn difference(&self) -> i64 {
        self.stored_quantity - self.log_quantity
    }
}

/// Repository for movement log reads.
#[derive(Debug, Clone)]
pub struct MovementRepository {
    pool: SqlitePool,
}

impl MovementRepository {
    pub fn new(pool: SqlitePool) -> Self {
        MovementRepository { pool }
    }

    /// Gets one entry by id.
    pub async fn get(&self, id: i64) -> DbResult<Option<MovementEntry>> {
        let sql = format!("SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE id = ?1");

        let entry = sqlx::query_as::<_, MovementEntry>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(entry)
    }

    /// Full history of one key in log order.
    pub async fn history(&self, key: &BalanceKey) -> DbResult<Vec<MovementEntry>> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
             WHERE product_id = ?1 AND warehouse_id = ?2 ORDER BY id"
        );

        let entries = sqlx::query_as::<_, MovementEntry>(&sql)
            .bind(&key.product_id)
            .bind(&key.warehouse_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    /// Entries sharing a correlation id (transfer halves, sale lines, reversals).
    pub async fn by_correlation(&self, correlation_id: &str) -> DbResult<Vec<MovementEntry>> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE correlation_id = ?1 ORDER BY id"
        );

        let entries = sqlx::query_as::<_, MovementEntry>(&sql)
            .bind(correlation_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    /// Entries produced for a sale id or purchase-order line id.
    pub async fn by_reference(&self, reference_id: &str) -> DbResult<Vec<MovementEntry>> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE reference_id = ?1 ORDER BY id"
        );

        let entries = sqlx::query_as::<_, MovementEntry>(&sql)
            .bind(reference_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    /// Every entry of a warehouse, most recent first.
    pub async fn recent_for_warehouse(
        &self,
        warehouse_id: &str,
        limit: u32,
    ) -> DbResult<Vec<MovementEntry>> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
             WHERE warehouse_id = ?1 ORDER BY id DESC LIMIT ?2"
        );

        let entries = sqlx::query_as::<_, MovementEntry>(&sql)
            .bind(warehouse_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    /// Sum of deltas for one key (zero when it never moved).
    pub async fn delta_sum(&self, key: &BalanceKey) -> DbResult<i64> {
        let sum: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity_delta), 0) FROM stock_movements \
             WHERE product_id = ?1 AND warehouse_id = ?2",
        )
        .bind(&key.product_id)
        .bind(&key.warehouse_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(sum)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stock_movements")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Balance rows whose quantity differs from the sum of their deltas.
    pub async fn drift(&self) -> DbResult<Vec<BalanceDrift>> {
        let drift = sqlx::query_as::<_, BalanceDrift>(
            r#"
            SELECT
                b.product_id,
                b.warehouse_id,
                b.quantity AS stored_quantity,
                COALESCE(m.total, 0) AS log_quantity
            FROM stock_balances b
            LEFT JOIN (
                SELECT product_id, warehouse_id, SUM(quantity_delta) AS total
                FROM stock_movements
                GROUP BY product_id, warehouse_id
            ) m ON m.product_id = b.product_id AND m.warehouse_id = b.warehouse_id
            WHERE b.quantity <> COALESCE(m.total, 0)
            ORDER BY b.product_id, b.warehouse_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(drift)
    }
}
