//! # Sale Repository
//!
//! Read access to sales and their lines. Sales are written only through
//! [`LedgerWriter`](crate::repository::ledger::LedgerWriter), together with
//! the stock they move.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │   hold_sale ──► OPEN ──complete_sale──► COMPLETED ──void_sale──► VOID  │
//! │                  │                          ▲                           │
//! │                  └──release_sale──► VOID    │                           │
//! │                                             │                           │
//! │   record_sale ──────────────────────────────┘                           │
//! │                                                                         │
//! │   OPEN       reserves stock, no movements                              │
//! │   COMPLETED  one `sale` movement per line                              │
//! │   VOID       compensating `void-reversal` movements (from completed)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::SqlitePool;

use crate::error::DbResult;
use depot_core::{Sale, SaleLine, SaleStatus};

const SALE_COLUMNS: &str = "id, receipt_number, warehouse_id, status, subtotal_cents, \
     discount_cents, total_cents, customer_name, payment_method, notes, actor_id, \
     correlation_id, void_reason, created_at, completed_at, voided_at";

const LINE_COLUMNS: &str = "id, sale_id, line_no, product_id, quantity, unit_price_cents, \
     discount_cents, line_total_cents, movement_id";

/// Repository for sale reads.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1");

        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(sale)
    }

    /// Gets a sale by its receipt number.
    pub async fn get_by_receipt(&self, receipt_number: &str) -> DbResult<Option<Sale>> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE receipt_number = ?1");

        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(receipt_number)
            .fetch_optional(&self.pool)
            .await?;

        Ok(sale)
    }

    /// Lines of a sale in line order.
    pub async fn get_lines(&self, sale_id: &str) -> DbResult<Vec<SaleLine>> {
        let sql = format!("SELECT {LINE_COLUMNS} FROM sale_lines WHERE sale_id = ?1 ORDER BY line_no");

        let lines = sqlx::query_as::<_, SaleLine>(&sql)
            .bind(sale_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(lines)
    }

    /// Sales of a warehouse in a given status, newest first.
    pub async fn list_by_status(&self, warehouse_id: &str, status: SaleStatus) -> DbResult<Vec<Sale>> {
        let sql = format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE warehouse_id = ?1 AND status = ?2 \
             ORDER BY created_at DESC"
        );

        let sales = sqlx::query_as::<_, Sale>(&sql)
            .bind(warehouse_id)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;

        Ok(sales)
    }
}
