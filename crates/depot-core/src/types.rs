//! # Ledger Types
//!
//! Core types used throughout Depot.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Ledger Types                                   │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  StockBalance   │   │  MovementEntry  │   │      Sale       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  (product,      │◄──│  delta          │   │  status         │       │
//! │  │   warehouse)    │   │  before / after │   │  correlation_id │       │
//! │  │  quantity       │   │  correlation_id │──►│  lines[]        │       │
//! │  │  reserved       │   │  actor, reason  │   └─────────────────┘       │
//! │  └─────────────────┘   └─────────────────┘                              │
//! │                                                                         │
//! │  Master data (read-only here): Product, Warehouse, PurchaseOrder(+Line) │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The balance row is a materialized cache of the movement log: for every key,
//! `quantity == Σ quantity_delta`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Balance Key
// =============================================================================

/// Composite key of the balance store: one row per (product, warehouse).
///
/// The derived `Ord` (product id, then warehouse id) is the global lock order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BalanceKey {
    pub product_id: String,
    pub warehouse_id: String,
}

impl BalanceKey {
    pub fn new(product_id: impl Into<String>, warehouse_id: impl Into<String>) -> Self {
        BalanceKey {
            product_id: product_id.into(),
            warehouse_id: warehouse_id.into(),
        }
    }
}

impl fmt::Display for BalanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.product_id, self.warehouse_id)
    }
}

// =============================================================================
// Stock Balance
// =============================================================================

/// Current on-hand and reserved quantity of a product at a warehouse.
///
/// Created lazily on the first movement and never deleted, so zero rows
/// stay around for audit continuity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockBalance {
    pub product_id: String,
    pub warehouse_id: String,
    /// On-hand quantity (≥ 0).
    pub quantity: i64,
    /// Quantity held by open sales (0 ≤ reserved ≤ quantity).
    pub reserved_quantity: i64,
    /// Free-text bin label.
    pub location: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl StockBalance {
    /// An empty balance for a key that has never moved.
    pub fn empty(key: &BalanceKey) -> Self {
        StockBalance {
            product_id: key.product_id.clone(),
            warehouse_id: key.warehouse_id.clone(),
            quantity: 0,
            reserved_quantity: 0,
            location: None,
            updated_at: Utc::now(),
        }
    }

    pub fn key(&self) -> BalanceKey {
        BalanceKey::new(&self.product_id, &self.warehouse_id)
    }

    /// On hand minus reserved.
    #[inline]
    pub fn available(&self) -> i64 {
        self.quantity - self.reserved_quantity
    }
}

// =============================================================================
// Movement Type
// =============================================================================

/// What kind of event produced a movement entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "kebab-case"))]
#[serde(rename_all = "kebab-case")]
pub enum MovementType {
    Adjustment,
    TransferOut,
    TransferIn,
    Sale,
    Receipt,
    VoidReversal,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Adjustment => "adjustment",
            MovementType::TransferOut => "transfer-out",
            MovementType::TransferIn => "transfer-in",
            MovementType::Sale => "sale",
            MovementType::Receipt => "receipt",
            MovementType::VoidReversal => "void-reversal",
        }
    }
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Movement Entry
// =============================================================================

/// One immutable ledger record of a quantity change.
///
/// Append-only: rows are never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct MovementEntry {
    /// Strictly increasing log id.
    pub id: i64,
    pub product_id: String,
    pub warehouse_id: String,
    pub movement_type: MovementType,
    /// Signed change applied to `quantity`.
    pub quantity_delta: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub reason: String,
    pub notes: Option<String>,
    pub actor_id: String,
    /// Links the two halves of a transfer, or the lines of one sale.
    pub correlation_id: Option<String>,
    /// Sale id or purchase-order line id the movement belongs to.
    pub reference_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl MovementEntry {
    pub fn key(&self) -> BalanceKey {
        BalanceKey::new(&self.product_id, &self.warehouse_id)
    }
}

/// A movement entry that has not been written yet (no id).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMovement {
    pub key: BalanceKey,
    pub movement_type: MovementType,
    pub quantity_delta: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub reason: String,
    pub notes: Option<String>,
    pub actor_id: String,
    pub correlation_id: Option<String>,
    pub reference_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl NewMovement {
    /// The stored entry once the log has assigned `id`.
    pub fn into_entry(self, id: i64) -> MovementEntry {
        MovementEntry {
            id,
            product_id: self.key.product_id,
            warehouse_id: self.key.warehouse_id,
            movement_type: self.movement_type,
            quantity_delta: self.quantity_delta,
            balance_before: self.balance_before,
            balance_after: self.balance_after,
            reason: self.reason,
            notes: self.notes,
            actor_id: self.actor_id,
            correlation_id: self.correlation_id,
            reference_id: self.reference_id,
            occurred_at: self.occurred_at,
        }
    }
}

// =============================================================================
// Sale Status
// =============================================================================

/// Lifecycle of a point-of-sale transaction: `open → completed | void`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Held: lines reserve stock but have not deducted it.
    Open,
    /// Stock deducted.
    Completed,
    /// Voided (from completed) or released (from open). Terminal.
    Void,
}

impl SaleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Open => "open",
            SaleStatus::Completed => "completed",
            SaleStatus::Void => "void",
        }
    }
}

impl fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash payment.
    #[default]
    Cash,
    /// Card payment on external terminal.
    ExternalCard,
}

// =============================================================================
// Sale
// =============================================================================

/// A customer transaction grouping one or more stock deductions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: String,
    pub receipt_number: String,
    pub warehouse_id: String,
    pub status: SaleStatus,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub customer_name: Option<String>,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    pub actor_id: String,
    /// Shared by every movement this sale produced.
    pub correlation_id: String,
    pub void_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub voided_at: Option<DateTime<Utc>>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// A line of a sale. Maps 1:1 to a `sale` movement once stock is deducted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleLine {
    pub id: String,
    pub sale_id: String,
    pub line_no: i64,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub discount_cents: i64,
    /// unit_price × quantity − discount.
    pub line_total_cents: i64,
    /// Set once the line has deducted stock.
    pub movement_id: Option<i64>,
}

impl SaleLine {
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

// =============================================================================
// Purchase Orders
// =============================================================================

/// Status of a purchase order. Partial receipt is not a distinct status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Open,
    /// Every line fully received. Terminal.
    Received,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Open => f.write_str("open"),
            OrderStatus::Received => f.write_str("received"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PurchaseOrder {
    pub id: String,
    pub po_number: String,
    pub supplier_name: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub received_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PurchaseOrderLine {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub ordered_quantity: i64,
    pub received_quantity: i64,
    pub unit_cost_cents: i64,
}

impl PurchaseOrderLine {
    /// Quantity still expected from the supplier.
    #[inline]
    pub fn outstanding(&self) -> i64 {
        self.ordered_quantity - self.received_quantity
    }

    #[inline]
    pub fn is_fully_received(&self) -> bool {
        self.received_quantity >= self.ordered_quantity
    }
}

// =============================================================================
// Master Data
// =============================================================================

/// Per-product stock thresholds, read from master data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProductThresholds {
    pub reorder_point: i64,
    pub min_stock_level: i64,
    pub max_stock_level: i64,
}

impl ProductThresholds {
    pub const fn new(reorder_point: i64, min_stock_level: i64, max_stock_level: i64) -> Self {
        ProductThresholds {
            reorder_point,
            min_stock_level,
            max_stock_level,
        }
    }
}

/// A product (external master data).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub unit_of_measure: String,
    pub reorder_point: i64,
    pub min_stock_level: i64,
    pub max_stock_level: i64,
    pub unit_cost_cents: i64,
    pub unit_price_cents: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Product {
    pub fn thresholds(&self) -> ProductThresholds {
        ProductThresholds::new(self.reorder_point, self.min_stock_level, self.max_stock_level)
    }

    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }
}

/// A warehouse (external master data).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Warehouse {
    pub id: String,
    pub code: String,
    pub name: String,
    pub is_active: bool,
}

// =============================================================================
// Unit Tests
// =============================================================================
