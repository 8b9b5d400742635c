//! # Ledger Writer
//!
//! The only code path that changes ledger state. A [`LedgerBatch`] is pure
//! data planned by the engine while it holds the key locks; [`LedgerWriter::commit`]
//! applies all of it in one SQLite transaction or none of it.
//!
//! ## Commit Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │   1. receipt sequence bump          (only when a sale is inserted)     │
//! │   2. balance upserts                WHERE quantity/reserved = expected │
//! │   3. movement appends               ids from last_insert_rowid         │
//! │   4. sale + lines insert                                               │
//! │   5. sale line → movement links                                        │
//! │   6. sale status transition         WHERE status = from                │
//! │   7. order line received totals     WHERE received = expected          │
//! │   8. order close                    WHERE status = 'open'              │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Any guarded write matching 0 rows → DbError::StaleWrite → ROLLBACK    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every statement is a write, so the transaction takes the SQLite write
//! lock on its first statement and never has to upgrade a read lock.

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use depot_core::balance::BalanceState;
use depot_core::{BalanceKey, NewMovement, OrderStatus, Sale, SaleLine, SaleStatus};

// =============================================================================
// Batch
// =============================================================================

/// New state for one balance row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceWrite {
    pub key: BalanceKey,
    /// The row as read under the lock; `None` if it did not exist yet.
    pub expected: Option<BalanceState>,
    pub after: BalanceState,
    /// `Some(label)` replaces the bin label, `Some(None)` clears it.
    pub location: Option<Option<String>>,
    pub updated_at: DateTime<Utc>,
}

/// A sale to insert. Its receipt number is assigned at commit.
#[derive(Debug, Clone)]
pub struct SaleInsert {
    pub sale: Sale,
    pub lines: Vec<SaleLine>,
}

/// Moves a sale from one status to another.
#[derive(Debug, Clone)]
pub struct SaleTransition {
    pub sale_id: String,
    pub from: SaleStatus,
    pub to: SaleStatus,
    pub at: DateTime<Utc>,
    pub void_reason: Option<String>,
}

/// New received total for an order line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLineWrite {
    pub line_id: String,
    pub expected_received: i64,
    pub received: i64,
}

/// Everything one ledger operation writes.
#[derive(Debug, Clone, Default)]
pub struct LedgerBatch {
    pub balances: Vec<BalanceWrite>,
    pub movements: Vec<NewMovement>,
    pub sale: Option<SaleInsert>,
    /// `(sale line id, index into movements)`.
    pub line_movements: Vec<(String, usize)>,
    pub sale_transition: Option<SaleTransition>,
    pub order_lines: Vec<OrderLineWrite>,
    /// `(order id, received at)`: closes an open order.
    pub close_order: Option<(String, DateTime<Utc>)>,
}

impl LedgerBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
            && self.movements.is_empty()
            && self.sale.is_none()
            && self.sale_transition.is_none()
            && self.order_lines.is_empty()
            && self.close_order.is_none()
    }
}

/// What the database assigned while committing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    /// One id per `LedgerBatch::movements` entry, same order.
    pub movement_ids: Vec<i64>,
    pub receipt_number: Option<String>,
}

// =============================================================================
// Writer
// =============================================================================

/// Applies ledger batches atomically.
#[derive(Debug, Clone)]
pub struct LedgerWriter {
    pool: SqlitePool,
}

impl LedgerWriter {
    pub fn new(pool: SqlitePool) -> Self {
        LedgerWriter { pool }
    }

    /// Commits a batch in a single transaction.
    ///
    /// ## Returns
    /// * `Ok(CommitReceipt)` - everything was written
    /// * `Err(DbError::StaleWrite)` - stored state was not what the batch expected;
    ///   nothing was written
    /// * `Err(_)` - storage failure; nothing was written
    pub async fn commit(&self, batch: &LedgerBatch) -> DbResult<CommitReceipt> {
        if batch.is_empty() {
            return Ok(CommitReceipt {
                movement_ids: Vec::new(),
                receipt_number: None,
            });
        }

        let mut tx = self.pool.begin().await?;

        let receipt_number = match &batch.sale {
            Some(insert) => Some(next_receipt_number(&mut tx, insert.sale.created_at).await?),
            None => None,
        };

        for write in &batch.balances {
            write_balance(&mut tx, write).await?;
        }

        let mut movement_ids = Vec::with_capacity(batch.movements.len());
        for movement in &batch.movements {
            movement_ids.push(append_movement(&mut tx, movement).await?);
        }

        if let Some(insert) = &batch.sale {
            let receipt = receipt_number.as_deref().unwrap_or_default();
            insert_sale(&mut tx, insert, receipt).await?;
        }

        for (line_id, index) in &batch.line_movements {
            let movement_id = movement_ids
                .get(*index)
                .copied()
                .ok_or_else(|| DbError::Internal(format!("no movement at index {index}")))?;

            let result = sqlx::query("UPDATE sale_lines SET movement_id = ?2 WHERE id = ?1")
                .bind(line_id)
                .bind(movement_id)
                .execute(&mut *tx)
                .await?;
            if result.rows_affected() == 0 {
                return Err(DbError::not_found("SaleLine", line_id.as_str()));
            }
        }

        if let Some(transition) = &batch.sale_transition {
            transition_sale(&mut tx, transition).await?;
        }

        for line in &batch.order_lines {
            let result = sqlx::query(
                "UPDATE purchase_order_lines SET received_quantity = ?3 \
                 WHERE id = ?1 AND received_quantity = ?2",
            )
            .bind(&line.line_id)
            .bind(line.expected_received)
            .bind(line.received)
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() == 0 {
                warn!(line_id = %line.line_id, "Order line changed under the batch");
                return Err(DbError::stale("PurchaseOrderLine", line.line_id.as_str()));
            }
        }

        if let Some((order_id, at)) = &batch.close_order {
            let result = sqlx::query(
                "UPDATE purchase_orders SET status = ?2, received_at = ?3 \
                 WHERE id = ?1 AND status = ?4",
            )
            .bind(order_id)
            .bind(OrderStatus::Received)
            .bind(at)
            .bind(OrderStatus::Open)
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() == 0 {
                return Err(DbError::stale("PurchaseOrder", order_id.as_str()));
            }
        }

        tx.commit().await?;

        debug!(
            balances = batch.balances.len(),
            movements = movement_ids.len(),
            "Ledger batch committed"
        );

        Ok(CommitReceipt {
            movement_ids,
            receipt_number,
        })
    }
}

// =============================================================================
// Statements
// =============================================================================

async fn write_balance(tx: &mut Transaction<'_, Sqlite>, write: &BalanceWrite) -> DbResult<()> {
    let key = &write.key;

    let rows = match write.expected {
        None => {
            let location = write.location.clone().flatten();
            sqlx::query(
                "INSERT INTO stock_balances \
                 (product_id, warehouse_id, quantity, reserved_quantity, location, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
                 ON CONFLICT (product_id, warehouse_id) DO NOTHING",
            )
            .bind(&key.product_id)
            .bind(&key.warehouse_id)
            .bind(write.after.quantity)
            .bind(write.after.reserved)
            .bind(location)
            .bind(write.updated_at)
            .execute(&mut **tx)
            .await?
            .rows_affected()
        }
        Some(expected) => {
            let (set_location, location) = match &write.location {
                Some(label) => (true, label.clone()),
                None => (false, None),
            };
            sqlx::query(
                "UPDATE stock_balances SET \
                     quantity = ?3, \
                     reserved_quantity = ?4, \
                     location = CASE WHEN ?5 THEN ?6 ELSE location END, \
                     updated_at = ?7 \
                 WHERE product_id = ?1 AND warehouse_id = ?2 \
                   AND quantity = ?8 AND reserved_quantity = ?9",
            )
            .bind(&key.product_id)
            .bind(&key.warehouse_id)
            .bind(write.after.quantity)
            .bind(write.after.reserved)
            .bind(set_location)
            .bind(location)
            .bind(write.updated_at)
            .bind(expected.quantity)
            .bind(expected.reserved)
            .execute(&mut **tx)
            .await?
            .rows_affected()
        }
    };

    if rows == 0 {
        warn!(key = %key, "Balance changed under the batch");
        return Err(DbError::stale("StockBalance", key.to_string()));
    }

    Ok(())
}

async fn append_movement(tx: &mut Transaction<'_, Sqlite>, m: &NewMovement) -> DbResult<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO stock_movements (
            product_id, warehouse_id, movement_type, quantity_delta,
            balance_before, balance_after, reason, notes, actor_id,
            correlation_id, reference_id, occurred_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
    )
    .bind(&m.key.product_id)
    .bind(&m.key.warehouse_id)
    .bind(m.movement_type)
    .bind(m.quantity_delta)
    .bind(m.balance_before)
    .bind(m.balance_after)
    .bind(&m.reason)
    .bind(&m.notes)
    .bind(&m.actor_id)
    .bind(&m.correlation_id)
    .bind(&m.reference_id)
    .bind(m.occurred_at)
    .execute(&mut **tx)
    .await?;

    Ok(result.last_insert_rowid())
}

async fn insert_sale(
    tx: &mut Transaction<'_, Sqlite>,
    insert: &SaleInsert,
    receipt_number: &str,
) -> DbResult<()> {
    let sale = &insert.sale;

    sqlx::query(
        r#"
        INSERT INTO sales (
            id, receipt_number, warehouse_id, status,
            subtotal_cents, discount_cents, total_cents,
            customer_name, payment_method, notes, actor_id, correlation_id,
            void_reason, created_at, completed_at, voided_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
        "#,
    )
    .bind(&sale.id)
    .bind(receipt_number)
    .bind(&sale.warehouse_id)
    .bind(sale.status)
    .bind(sale.subtotal_cents)
    .bind(sale.discount_cents)
    .bind(sale.total_cents)
    .bind(&sale.customer_name)
    .bind(sale.payment_method)
    .bind(&sale.notes)
    .bind(&sale.actor_id)
    .bind(&sale.correlation_id)
    .bind(&sale.void_reason)
    .bind(sale.created_at)
    .bind(sale.completed_at)
    .bind(sale.voided_at)
    .execute(&mut **tx)
    .await?;

    for line in &insert.lines {
        sqlx::query(
            r#"
            INSERT INTO sale_lines (
                id, sale_id, line_no, product_id, quantity,
                unit_price_cents, discount_cents, line_total_cents, movement_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL)
            "#,
        )
        .bind(&line.id)
        .bind(&line.sale_id)
        .bind(line.line_no)
        .bind(&line.product_id)
        .bind(line.quantity)
        .bind(line.unit_price_cents)
        .bind(line.discount_cents)
        .bind(line.line_total_cents)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

async fn transition_sale(tx: &mut Transaction<'_, Sqlite>, t: &SaleTransition) -> DbResult<()> {
    let (completed_at, voided_at) = match t.to {
        SaleStatus::Completed => (Some(t.at), None),
        SaleStatus::Void => (None, Some(t.at)),
        SaleStatus::Open => (None, None),
    };

    let result = sqlx::query(
        "UPDATE sales SET \
             status = ?2, \
             completed_at = COALESCE(?4, completed_at), \
             voided_at = COALESCE(?5, voided_at), \
             void_reason = COALESCE(?6, void_reason) \
         WHERE id = ?1 AND status = ?3",
    )
    .bind(&t.sale_id)
    .bind(t.to)
    .bind(t.from)
    .bind(completed_at)
    .bind(voided_at)
    .bind(&t.void_reason)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        warn!(sale_id = %t.sale_id, from = %t.from, to = %t.to, "Sale status changed under the batch");
        return Err(DbError::stale("Sale", t.sale_id.as_str()));
    }

    Ok(())
}

/// Bumps the daily counter and formats `YYYYMMDD-NNNNNN`.
async fn next_receipt_number(tx: &mut Transaction<'_, Sqlite>, at: DateTime<Utc>) -> DbResult<String> {
    let day = at.format("%Y%m%d").to_string();

    let seq: i64 = sqlx::query_scalar(
        "INSERT INTO receipt_sequences (day, last_seq) VALUES (?1, 1) \
         ON CONFLICT (day) DO UPDATE SET last_seq = last_seq + 1 \
         RETURNING last_seq",
    )
    .bind(&day)
    .fetch_one(&mut **tx)
    .await?;

    Ok(format_receipt_number(&day, seq))
}

fn format_receipt_number(day: &str, seq: i64) -> String {
    format!("{}-{:06}", day, seq)
}
