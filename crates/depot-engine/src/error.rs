//! # Engine Error Types
//!
//! ## Error Translation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Translation                                    │
//! │                                                                         │
//! │  LedgerError (business rule)  ─┐                                       │
//! │  DbError (storage)            ─┼─► EngineError ──► ApiError            │
//! │  config problems              ─┘      kind()        { code, message }  │
//! │                                                                         │
//! │  Business rules keep their own message for the caller.                 │
//! │  Storage details are logged and replaced by a generic message.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use depot_core::{ErrorKind, LedgerError, ValidationError};
use depot_db::DbError;

/// Every failure a [`Ledger`](crate::Ledger) call can return.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::Ledger(LedgerError::Validation(err))
    }
}

impl EngineError {
    /// Machine-readable category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Ledger(err) => err.kind(),
            EngineError::Database(DbError::NotFound { .. }) => ErrorKind::NotFound,
            EngineError::Database(DbError::UniqueViolation { .. }) => ErrorKind::Validation,
            EngineError::Database(_) | EngineError::Config(_) => ErrorKind::Internal,
        }
    }

    /// The business-rule error, if this is one.
    pub fn as_ledger(&self) -> Option<&LedgerError> {
        match self {
            EngineError::Ledger(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

// =============================================================================
// API Error
// =============================================================================

/// What the (external) API layer hands to its clients.
///
/// ## Serialization
/// ```json
/// {
///   "code": "INSUFFICIENT_STOCK",
///   "message": "not enough stock available",
///   "detail": "Insufficient stock for product P1 in warehouse W1: available 4, requested 5"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub code: ErrorKind,

    /// User-facing message for the kind.
    pub message: String,

    /// Rule-specific detail; never set for storage failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ApiError {
    pub fn new(code: ErrorKind) -> Self {
        ApiError {
            code,
            message: code.user_message().to_string(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::new(err.kind()).with_detail(err.to_string())
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => {
                ApiError::new(ErrorKind::NotFound).with_detail(format!("{} not found: {}", entity, id))
            }
            DbError::UniqueViolation { field, value } => ApiError::new(ErrorKind::Validation)
                .with_detail(format!("{} '{}' already exists", field, value)),
            DbError::StaleWrite { entity, id } => {
                tracing::warn!(%entity, %id, "Stale ledger write surfaced to caller");
                ApiError::new(ErrorKind::Internal)
            }
            other => {
                // Log the actual error but return a generic message
                tracing::error!(error = %other, "Database operation failed");
                ApiError::new(ErrorKind::Internal)
            }
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Ledger(e) => e.into(),
            EngineError::Database(e) => e.into(),
            EngineError::Config(e) => {
                tracing::error!(error = %e, "Engine misconfigured");
                ApiError::new(ErrorKind::Internal)
            }
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message() {
        let api: ApiError = EngineError::from(LedgerError::InsufficientStock {
            product_id: "P1".into(),
            warehouse_id: "W1".into(),
            available: 4,
            requested: 5,
        })
        .into();

        assert_eq!(api.code, ErrorKind::InsufficientStock);
        assert_eq!(api.message, "not enough stock available");
        assert!(api.detail.unwrap().contains("available 4"));
    }

    #[test]
    fn test_over_receipt_message() {
        let api: ApiError = LedgerError::OverReceipt {
            line_id: "L1".into(),
            ordered: 10,
            received: 8,
            requested: 3,
        }
        .into();
        assert_eq!(api.message, "cannot receive more than ordered");
    }

    #[test]
    fn test_storage_details_hidden() {
        let api: ApiError = EngineError::Database(DbError::QueryFailed("near SELEC".into())).into();
        assert_eq!(api.code, ErrorKind::Internal);
        assert!(api.detail.is_none());
    }

    #[test]
    fn test_kind_of_database_not_found() {
        let err = EngineError::Database(DbError::not_found("Sale", "s-1"));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_wire_shape() {
        let api = ApiError::new(ErrorKind::Timeout);
        let json = serde_json::to_value(&api).unwrap();
        assert_eq!(json["code"], "TIMEOUT");
        assert!(json.get("detail").is_none());
    }
}
