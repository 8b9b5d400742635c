//! # depot-core: Pure Ledger Rules for Depot
//!
//! This crate holds the stock-ledger rules as pure functions with zero I/O
//! dependencies. The database layer persists what these functions compute;
//! the engine decides *when* they run (under which locks).
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Depot Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              API layer (external, out of scope)                 │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ typed requests                         │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            depot-engine (Transaction Coordinator)               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ depot-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │  balance  │  │   stock   │  │ receiving │  │   │
//! │  │   │ Movement  │  │ BalanceΔ  │  │ available │  │ over-rcpt │  │   │
//! │  │   │ Sale, PO  │  │  chains   │  │ low-stock │  │  status   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO LOCKS • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    depot-db (Database Layer)                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Ledger types (StockBalance, MovementEntry, Sale, PurchaseOrderLine)
//! - [`money`] - Integer-cent money for sale lines
//! - [`balance`] - Balance arithmetic: debit/credit/reserve plans, chain checks
//! - [`stock`] - Availability and low-stock evaluation
//! - [`receiving`] - Purchase-order receipt bookkeeping
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use depot_core::balance::BalanceState;
//! use depot_core::stock::{evaluate_low_stock, ProductThresholds};
//!
//! let state = BalanceState::new(10, 0);
//! let change = state.plan_adjust(-6).unwrap();
//! assert_eq!(change.after.quantity, 4);
//!
//! let thresholds = ProductThresholds::new(5, 2, 20);
//! let status = evaluate_low_stock(change.after.quantity, &thresholds);
//! assert!(status.is_low_stock);
//! assert!(!status.is_critical);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod balance;
pub mod error;
pub mod money;
pub mod receiving;
pub mod stock;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{ErrorKind, LedgerError, LedgerResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum number of lines allowed in a single sale.
///
/// Each line takes one key lock, so this also bounds lock fan-out.
pub const MAX_SALE_LINES: usize = 100;

/// Maximum magnitude of a single quantity change.
///
/// Keeps every balance sum far away from `i64` overflow.
pub const MAX_QUANTITY: i64 = 1_000_000_000;

/// Default maximum length of a reason string.
pub const DEFAULT_MAX_REASON_LEN: usize = 500;
