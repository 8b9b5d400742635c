//! # Purchase Order Repository
//!
//! Purchase orders are external master data. The ledger reads them and
//! advances `received_quantity` / `status` through the batch writer; the
//! insert helpers exist for seeding and tests.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use depot_core::{OrderStatus, PurchaseOrder, PurchaseOrderLine};

const ORDER_COLUMNS: &str = "id, po_number, supplier_name, status, created_at, received_at";

const LINE_COLUMNS: &str =
    "id, order_id, product_id, ordered_quantity, received_quantity, unit_cost_cents";

/// Repository for purchase orders and their lines.
#[derive(Debug, Clone)]
pub struct PurchaseOrderRepository {
    pool: SqlitePool,
}

impl PurchaseOrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PurchaseOrderRepository { pool }
    }

    pub async fn get_order(&self, id: &str) -> DbResult<Option<PurchaseOrder>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM purchase_orders WHERE id = ?1");

        let order = sqlx::query_as::<_, PurchaseOrder>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(order)
    }

    pub async fn get_line(&self, id: &str) -> DbResult<Option<PurchaseOrderLine>> {
        let sql = format!("SELECT {LINE_COLUMNS} FROM purchase_order_lines WHERE id = ?1");

        let line = sqlx::query_as::<_, PurchaseOrderLine>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(line)
    }

    /// Every line of an order, in id order.
    pub async fn get_lines(&self, order_id: &str) -> DbResult<Vec<PurchaseOrderLine>> {
        let sql = format!(
            "SELECT {LINE_COLUMNS} FROM purchase_order_lines WHERE order_id = ?1 ORDER BY id"
        );

        let lines = sqlx::query_as::<_, PurchaseOrderLine>(&sql)
            .bind(order_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(lines)
    }

    /// Creates an open order with its lines (received quantities as given).
    pub async fn insert_order(
        &self,
        po_number: &str,
        supplier_name: &str,
        lines: &[(String, i64, i64)],
    ) -> DbResult<(PurchaseOrder, Vec<PurchaseOrderLine>)> {
        let order = PurchaseOrder {
            id: uuid::Uuid::new_v4().to_string(),
            po_number: po_number.to_string(),
            supplier_name: supplier_name.to_string(),
            status: OrderStatus::Open,
            created_at: Utc::now(),
            received_at: None,
        };

        debug!(id = %order.id, po_number = %order.po_number, lines = lines.len(), "Inserting purchase order");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO purchase_orders (id, po_number, supplier_name, status, created_at, received_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&order.id)
        .bind(&order.po_number)
        .bind(&order.supplier_name)
        .bind(order.status)
        .bind(order.created_at)
        .bind(order.received_at)
        .execute(&mut *tx)
        .await?;

        let mut inserted = Vec::with_capacity(lines.len());
        for (product_id, ordered_quantity, unit_cost_cents) in lines {
            let line = PurchaseOrderLine {
                id: uuid::Uuid::new_v4().to_string(),
                order_id: order.id.clone(),
                product_id: product_id.clone(),
                ordered_quantity: *ordered_quantity,
                received_quantity: 0,
                unit_cost_cents: *unit_cost_cents,
            };

            sqlx::query(
                "INSERT INTO purchase_order_lines \
                 (id, order_id, product_id, ordered_quantity, received_quantity, unit_cost_cents) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .bind(&line.id)
            .bind(&line.order_id)
            .bind(&line.product_id)
            .bind(line.ordered_quantity)
            .bind(line.received_quantity)
            .bind(line.unit_cost_cents)
            .execute(&mut *tx)
            .await?;

            inserted.push(line);
        }

        tx.commit().await?;

        Ok((order, inserted))
    }
}
