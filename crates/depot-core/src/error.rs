//! # Error Types
//!
//! Domain-specific error types for depot-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  depot-core errors (this file)                                         │
//! │  ├── LedgerError      - Business rule violations (typed kinds)         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  depot-db errors (separate crate)                                      │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  depot-engine errors                                                   │
//! │  ├── EngineError      - LedgerError | DbError | config                 │
//! │  └── ApiError         - What the API layer sees (serialized)           │
//! │                                                                         │
//! │  Flow: ValidationError → LedgerError → EngineError → ApiError          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Ledger Error
// =============================================================================

/// Ledger business-rule failures.
///
/// Every variant maps to exactly one [`ErrorKind`]; a failed operation never
/// leaves partial state behind.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Zero or negative quantity where a positive one is required.
    #[error("Invalid quantity for {field}: {value}")]
    InvalidQuantity { field: String, value: i64 },

    /// The operation would drive the balance (or its available part) below zero.
    ///
    /// ## User Workflow
    /// ```text
    /// Checkout (qty: 5)
    ///      │
    ///      ▼
    /// Lock (P1, W1) → read: on hand 4, reserved 1
    ///      │
    ///      ▼
    /// InsufficientStock { available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// API shows: "not enough stock available"
    /// ```
    #[error(
        "Insufficient stock for product {product_id} in warehouse {warehouse_id}: \
         available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_id: String,
        warehouse_id: String,
        available: i64,
        requested: i64,
    },

    /// Self-transfer, or a warehouse that is inactive.
    #[error("Invalid warehouse {warehouse_id}: {reason}")]
    InvalidWarehouse { warehouse_id: String, reason: String },

    /// Receiving would push an order line past its ordered quantity.
    #[error(
        "Over-receipt on order line {line_id}: ordered {ordered}, \
         already received {received}, receiving {requested}"
    )]
    OverReceipt {
        line_id: String,
        ordered: i64,
        received: i64,
        requested: i64,
    },

    /// Voiding a sale that is not completed.
    #[error("Sale {sale_id} is {status}, only completed sales can be voided")]
    AlreadyVoid { sale_id: String, status: String },

    /// Completing or releasing a sale that is not open.
    #[error("Sale {sale_id} is {status}, expected {expected}")]
    InvalidSaleStatus {
        sale_id: String,
        status: String,
        expected: String,
    },

    /// Locks could not be acquired before the caller's deadline.
    #[error("Timed out after {waited_ms}ms waiting for {key}")]
    Timeout { key: String, waited_ms: u64 },

    /// Unknown product, warehouse, order line, or sale.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Input validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl LedgerError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        LedgerError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates an InvalidQuantity error.
    pub fn invalid_quantity(field: impl Into<String>, value: i64) -> Self {
        LedgerError::InvalidQuantity {
            field: field.into(),
            value,
        }
    }

    /// Creates an InvalidWarehouse error.
    pub fn invalid_warehouse(warehouse_id: impl Into<String>, reason: impl Into<String>) -> Self {
        LedgerError::InvalidWarehouse {
            warehouse_id: warehouse_id.into(),
            reason: reason.into(),
        }
    }

    /// Returns the error kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::InvalidQuantity { .. } => ErrorKind::InvalidQuantity,
            LedgerError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            LedgerError::InvalidWarehouse { .. } => ErrorKind::InvalidWarehouse,
            LedgerError::OverReceipt { .. } => ErrorKind::OverReceipt,
            LedgerError::AlreadyVoid { .. } => ErrorKind::AlreadyVoid,
            LedgerError::InvalidSaleStatus { .. } => ErrorKind::InvalidSaleStatus,
            LedgerError::Timeout { .. } => ErrorKind::Timeout,
            LedgerError::NotFound { .. } => ErrorKind::NotFound,
            LedgerError::Validation(_) => ErrorKind::Validation,
        }
    }
}

// =============================================================================
// Error Kind
// =============================================================================

/// Machine-readable failure category, shared by every layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidQuantity,
    InsufficientStock,
    InvalidWarehouse,
    OverReceipt,
    AlreadyVoid,
    InvalidSaleStatus,
    Timeout,
    NotFound,
    Validation,
    /// Storage or configuration failure (not a business rule).
    Internal,
}

impl ErrorKind {
    /// The message shown to an end user for this kind of failure.
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::InvalidQuantity => "quantity must be a positive, non-zero amount",
            ErrorKind::InsufficientStock => "not enough stock available",
            ErrorKind::InvalidWarehouse => "the selected warehouse cannot be used",
            ErrorKind::OverReceipt => "cannot receive more than ordered",
            ErrorKind::AlreadyVoid => "this sale has already been voided",
            ErrorKind::InvalidSaleStatus => "this sale cannot be changed in its current state",
            ErrorKind::Timeout => "the stock record is busy, please try again",
            ErrorKind::NotFound => "the requested record does not exist",
            ErrorKind::Validation => "the request contains invalid data",
            ErrorKind::Internal => "an internal error occurred",
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any lock is taken, so rejected input never contends.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with LedgerError.
pub type LedgerResult<T> = Result<T, LedgerError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = LedgerError::InsufficientStock {
            product_id: "P1".to_string(),
            warehouse_id: "W1".to_string(),
            available: 4,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for product P1 in warehouse W1: available 4, requested 5"
        );
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            LedgerError::not_found("Sale", "s-1").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            LedgerError::invalid_quantity("quantity_delta", 0).kind(),
            ErrorKind::InvalidQuantity
        );
        assert_eq!(
            LedgerError::invalid_warehouse("W1", "self-transfer").kind(),
            ErrorKind::InvalidWarehouse
        );
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(
            ErrorKind::InsufficientStock.user_message(),
            "not enough stock available"
        );
        assert_eq!(
            ErrorKind::OverReceipt.user_message(),
            "cannot receive more than ordered"
        );
    }

    #[test]
    fn test_validation_converts_to_ledger_error() {
        let validation_err = ValidationError::Required {
            field: "reason".to_string(),
        };
        let err: LedgerError = validation_err.into();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_kind_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorKind::InsufficientStock).unwrap();
        assert_eq!(json, "\"INSUFFICIENT_STOCK\"");
    }
}
