//! # Purchase-Order Receiving
//!
//! Applies supplier deliveries to balances and keeps the order's
//! bookkeeping in the same atomic write.
//!
//! ```text
//! receive_purchase_order_line(L2, 4, W1)
//!      │
//!      ├─ lock order O1, balance P7@W1
//!      ├─ re-read L2 → plan_receipt (OverReceipt?)
//!      ├─ plan_credit P7@W1
//!      └─ commit: balance + receipt movement + L2.received
//!                 (+ O1 → received, if every line is now complete)
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::coordinator::{missing_movement, Ledger, Provenance, RequestContext};
use crate::error::EngineResult;
use crate::locks::LockKey;
use depot_core::receiving::{order_status_after, plan_receipt};
use depot_core::validation::{validate_id, validate_positive_quantity};
use depot_core::{
    BalanceKey, LedgerError, MovementEntry, MovementType, OrderStatus, PurchaseOrder,
    PurchaseOrderLine, StockBalance,
};
use depot_db::{LedgerBatch, OrderLineWrite};

const RECEIPT_REASON: &str = "purchase order receipt";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveRequest {
    pub order_line_id: String,
    pub received_quantity: i64,
    pub warehouse_id: String,
}

impl ReceiveRequest {
    pub fn new(
        order_line_id: impl Into<String>,
        received_quantity: i64,
        warehouse_id: impl Into<String>,
    ) -> Self {
        ReceiveRequest {
            order_line_id: order_line_id.into(),
            received_quantity,
            warehouse_id: warehouse_id.into(),
        }
    }
}

/// Result of receiving against one order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptOutcome {
    pub line: PurchaseOrderLine,
    pub balance: StockBalance,
    pub movement: MovementEntry,
    /// Status of the parent order after this receipt.
    pub order_status: OrderStatus,
}

/// Result of receiving every outstanding line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReceiptOutcome {
    pub order: PurchaseOrder,
    /// Lines that received stock, with their new totals.
    pub lines: Vec<PurchaseOrderLine>,
    pub balances: Vec<StockBalance>,
    /// One receipt movement per received line, sharing a correlation id.
    pub movements: Vec<MovementEntry>,
    pub correlation_id: Option<String>,
}

impl Ledger {
    /// Receives `received_quantity` against one purchase-order line.
    ///
    /// ## Errors
    /// * `OverReceipt` - more than the line still expects; nothing changes
    /// * `InvalidQuantity` - zero or negative quantity
    /// * `NotFound` - unknown order line
    /// * `InvalidWarehouse` - inactive warehouse
    pub async fn receive_purchase_order_line(
        &self,
        ctx: &RequestContext,
        request: ReceiveRequest,
    ) -> EngineResult<ReceiptOutcome> {
        let deadline = self.deadline(ctx);
        self.validate_context(ctx)?;
        validate_id("order_line_id", &request.order_line_id)?;
        validate_id("warehouse_id", &request.warehouse_id)?;
        validate_positive_quantity("received_quantity", request.received_quantity)?;

        let line = self.require_order_line(&request.order_line_id).await?;
        self.require_warehouse(&request.warehouse_id).await?;

        let key = BalanceKey::new(&line.product_id, &request.warehouse_id);
        let _locks = self
            .locks
            .acquire(
                [LockKey::Order(line.order_id.clone()), LockKey::from(key.clone())],
                deadline,
            )
            .await?;

        // Another receipt may have landed while we waited.
        let mut line = self.require_order_line(&line.id).await?;
        let received = plan_receipt(&line, request.received_quantity)?;

        let mut work = self.load(std::slice::from_ref(&key)).await?;
        let change = work.apply(&key, |s| s.plan_credit(request.received_quantity))?;

        let expected_received = line.received_quantity;
        line.received_quantity = received;

        let mut order_lines = self.catalog.order_lines(&line.order_id).await?;
        for other in order_lines.iter_mut().filter(|l| l.id == line.id) {
            other.received_quantity = received;
        }
        let order_status = order_status_after(&order_lines);

        let provenance =
            Provenance::new(ctx, RECEIPT_REASON.to_string(), None).referencing(&line.id);

        let mut batch = LedgerBatch::new();
        batch.balances = work.writes(provenance.at);
        batch
            .movements
            .push(provenance.movement(&key, MovementType::Receipt, &change));
        batch.order_lines.push(OrderLineWrite {
            line_id: line.id.clone(),
            expected_received,
            received,
        });
        if order_status == OrderStatus::Received {
            batch.close_order = Some((line.order_id.clone(), provenance.at));
        }

        let mut movements = self.commit(batch).await?;
        let movement = movements.pop().ok_or_else(missing_movement)?;

        info!(
            line_id = %line.id,
            order_id = %line.order_id,
            quantity = request.received_quantity,
            received,
            ordered = line.ordered_quantity,
            order_status = %order_status,
            actor = %ctx.actor_id,
            "Purchase order line received"
        );

        Ok(ReceiptOutcome {
            balance: work.snapshot(&key, provenance.at),
            line,
            movement,
            order_status,
        })
    }

    /// Receives every outstanding line of an order into one warehouse and
    /// closes the order, all in one atomic write.
    ///
    /// An order with nothing outstanding is returned unchanged.
    pub async fn receive_remaining(
        &self,
        ctx: &RequestContext,
        order_id: &str,
        warehouse_id: &str,
    ) -> EngineResult<OrderReceiptOutcome> {
        let deadline = self.deadline(ctx);
        self.validate_context(ctx)?;
        validate_id("order_id", order_id)?;
        validate_id("warehouse_id", warehouse_id)?;

        self.require_order(order_id).await?;
        self.require_warehouse(warehouse_id).await?;

        let mut keys: Vec<BalanceKey> = self
            .catalog
            .order_lines(order_id)
            .await?
            .iter()
            .map(|line| BalanceKey::new(&line.product_id, warehouse_id))
            .collect();
        keys.sort();
        keys.dedup();

        let _locks = self
            .locks
            .acquire(
                keys.iter()
                    .cloned()
                    .map(LockKey::from)
                    .chain(std::iter::once(LockKey::Order(order_id.to_string()))),
                deadline,
            )
            .await?;

        let mut order = self.require_order(order_id).await?;
        let mut lines = self.catalog.order_lines(order_id).await?;
        let outstanding: Vec<usize> = (0..lines.len())
            .filter(|&i| lines[i].outstanding() > 0)
            .collect();

        if outstanding.is_empty() {
            debug!(order_id, "Nothing outstanding on order");
            return Ok(OrderReceiptOutcome {
                order,
                lines: Vec::new(),
                balances: Vec::new(),
                movements: Vec::new(),
                correlation_id: None,
            });
        }

        let correlation_id = Uuid::new_v4().to_string();
        let mut work = self.load(&keys).await?;
        let mut batch = LedgerBatch::new();
        let now = Utc::now();

        for &i in &outstanding {
            let line = &mut lines[i];
            let quantity = line.outstanding();
            let received = plan_receipt(line, quantity)?;
            let key = BalanceKey::new(&line.product_id, warehouse_id);
            let change = work.apply(&key, |s| s.plan_credit(quantity))?;

            let provenance = Provenance::new(ctx, RECEIPT_REASON.to_string(), None)
                .correlated(&correlation_id)
                .referencing(&line.id);
            batch
                .movements
                .push(provenance.movement(&key, MovementType::Receipt, &change));
            batch.order_lines.push(OrderLineWrite {
                line_id: line.id.clone(),
                expected_received: line.received_quantity,
                received,
            });
            line.received_quantity = received;
        }

        let status = order_status_after(&lines);
        if status == OrderStatus::Received && order.status == OrderStatus::Open {
            batch.close_order = Some((order.id.clone(), now));
            order.status = OrderStatus::Received;
            order.received_at = Some(now);
        }
        batch.balances = work.writes(now);

        let movements = self.commit(batch).await?;

        info!(
            order_id,
            lines = outstanding.len(),
            correlation_id = %correlation_id,
            actor = %ctx.actor_id,
            "Purchase order received in full"
        );

        let received_lines = outstanding.iter().map(|&i| lines[i].clone()).collect();
        Ok(OrderReceiptOutcome {
            order,
            lines: received_lines,
            balances: work.snapshots(now),
            movements,
            correlation_id: Some(correlation_id),
        })
    }

    async fn require_order_line(&self, line_id: &str) -> EngineResult<PurchaseOrderLine> {
        self.catalog
            .order_line(line_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("PurchaseOrderLine", line_id).into())
    }

    async fn require_order(&self, order_id: &str) -> EngineResult<PurchaseOrder> {
        self.catalog
            .order(order_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("PurchaseOrder", order_id).into())
    }
}
