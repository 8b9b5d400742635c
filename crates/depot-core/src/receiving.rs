//! # Receipt Bookkeeping
//!
//! Pure rules for applying supplier deliveries against purchase-order lines.
//!
//! ```text
//!   line: ordered 10, received 6
//!      receive 3 → received 9   (order stays open)
//!      receive 1 → received 10  (line complete; order received if all are)
//!      receive 1 → OverReceipt  (nothing changes)
//! ```

use crate::error::{LedgerError, LedgerResult};
use crate::types::{OrderStatus, PurchaseOrderLine};
use crate::MAX_QUANTITY;

/// Validates a receipt and returns the line's new received total.
pub fn plan_receipt(line: &PurchaseOrderLine, quantity: i64) -> LedgerResult<i64> {
    if quantity <= 0 || quantity > MAX_QUANTITY {
        return Err(LedgerError::invalid_quantity("received_quantity", quantity));
    }

    if quantity > line.outstanding() {
        return Err(LedgerError::OverReceipt {
            line_id: line.id.clone(),
            ordered: line.ordered_quantity,
            received: line.received_quantity,
            requested: quantity,
        });
    }

    Ok(line.received_quantity + quantity)
}

/// Status of an order given the current state of all of its lines.
///
/// An order with no lines stays open.
pub fn order_status_after<'a>(lines: impl IntoIterator<Item = &'a PurchaseOrderLine>) -> OrderStatus {
    let mut any = false;
    for line in lines {
        any = true;
        if !line.is_fully_received() {
            return OrderStatus::Open;
        }
    }

    if any {
        OrderStatus::Received
    } else {
        OrderStatus::Open
    }
}
