//! # Availability & Low-Stock Evaluation
//!
//! Read-side functions over current balance state. Nothing here is stored:
//! alerts are computed on read so they always agree with the balances.
//!
//! ## Threshold Bands
//! ```text
//!   quantity
//!      ▲
//!  max ┤─────────────── suggested order = max − quantity
//!      │
//!  rop ┤─────────────── quantity ≤ reorder point   → low stock
//!      │
//!  min ┤─────────────── quantity ≤ min stock level → critical
//!    0 ┴───────────────
//! ```

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

pub use crate::types::ProductThresholds;
use crate::types::{BalanceKey, StockBalance};

// =============================================================================
// Availability
// =============================================================================

/// Snapshot of how much of a balance can be sold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub product_id: String,
    pub warehouse_id: String,
    pub on_hand: i64,
    pub reserved: i64,
    pub available: i64,
}

impl Availability {
    /// Availability of a key that has no balance row yet.
    pub fn none(key: &BalanceKey) -> Self {
        Availability {
            product_id: key.product_id.clone(),
            warehouse_id: key.warehouse_id.clone(),
            on_hand: 0,
            reserved: 0,
            available: 0,
        }
    }

    /// Whether `qty` could be added to a cart right now.
    ///
    /// Advisory only: the authoritative check happens when the sale commits.
    #[inline]
    pub fn can_sell(&self, qty: i64) -> bool {
        qty > 0 && self.available >= qty
    }
}

/// `quantity - reserved_quantity`, never below zero.
pub fn available_quantity(balance: &StockBalance) -> Availability {
    Availability {
        product_id: balance.product_id.clone(),
        warehouse_id: balance.warehouse_id.clone(),
        on_hand: balance.quantity,
        reserved: balance.reserved_quantity,
        available: balance.available().max(0),
    }
}

// =============================================================================
// Low Stock
// =============================================================================

/// Result of comparing a quantity with a product's thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockStatus {
    pub quantity: i64,
    pub is_low_stock: bool,
    pub is_critical: bool,
    pub suggested_order_quantity: i64,
}

/// Pure threshold check.
///
/// ```rust
/// use depot_core::stock::{evaluate_low_stock, ProductThresholds};
///
/// let status = evaluate_low_stock(4, &ProductThresholds::new(5, 2, 20));
/// assert!(status.is_low_stock);
/// assert_eq!(status.suggested_order_quantity, 16);
/// ```
pub fn evaluate_low_stock(quantity: i64, thresholds: &ProductThresholds) -> LowStockStatus {
    LowStockStatus {
        quantity,
        is_low_stock: quantity <= thresholds.reorder_point,
        is_critical: quantity <= thresholds.min_stock_level,
        suggested_order_quantity: (thresholds.max_stock_level - quantity).max(0),
    }
}

/// Alert severity, ordered most urgent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Critical,
    Low,
}

/// A computed (never persisted) low-stock alert for one balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockAlert {
    pub product_id: String,
    pub warehouse_id: String,
    pub severity: AlertSeverity,
    pub quantity: i64,
    pub reorder_point: i64,
    pub min_stock_level: i64,
    pub suggested_order_quantity: i64,
}

impl LowStockAlert {
    /// Builds an alert if the balance is at or below its reorder point.
    pub fn from_balance(balance: &StockBalance, thresholds: &ProductThresholds) -> Option<Self> {
        let status = evaluate_low_stock(balance.quantity, thresholds);
        if !status.is_low_stock && !status.is_critical {
            return None;
        }

        let severity = if status.is_critical {
            AlertSeverity::Critical
        } else {
            AlertSeverity::Low
        };

        Some(LowStockAlert {
            product_id: balance.product_id.clone(),
            warehouse_id: balance.warehouse_id.clone(),
            severity,
            quantity: balance.quantity,
            reorder_point: thresholds.reorder_point,
            min_stock_level: thresholds.min_stock_level,
            suggested_order_quantity: status.suggested_order_quantity,
        })
    }
}

/// Critical first, then by how far below the reorder point, then by product.
pub fn sort_by_urgency(alerts: &mut [LowStockAlert]) {
    alerts.sort_by(|a, b| match a.severity.cmp(&b.severity) {
        Ordering::Equal => (a.quantity - a.reorder_point)
            .cmp(&(b.quantity - b.reorder_point))
            .then_with(|| a.product_id.cmp(&b.product_id)),
        other => other,
    });
}

// =============================================================================
// Unit Tests
// =============================================================================
