//! # Validation Module
//!
//! Input validation run before any lock is acquired.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Request shape (THIS MODULE)                                  │
//! │  ├── ids present, reasons bounded, quantities positive                 │
//! │  └── rejected without touching locks or the database                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Business rules under lock (balance module)                   │
//! │  ├── sufficient available stock                                        │
//! │  └── over-receipt, sale status                                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite CHECK constraints)                          │
//! │  └── quantity ≥ 0, reserved ≤ quantity, received ≤ ordered             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use depot_core::validation::{validate_delta, validate_reason};
//!
//! validate_reason("damage", 500, true).unwrap();
//! assert!(validate_delta(0).is_err());
//! ```

use crate::error::{LedgerError, LedgerResult, ValidationError};
use crate::money::Money;
use crate::{MAX_QUANTITY, MAX_SALE_LINES};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Maximum length of any identifier.
const MAX_ID_LEN: usize = 64;

/// Maximum length of free-text notes.
const MAX_NOTES_LEN: usize = 2000;

/// Maximum length of a bin location label.
const MAX_LOCATION_LEN: usize = 100;

// =============================================================================
// String Validators
// =============================================================================

/// Validates an identifier (product, warehouse, sale, order line, actor).
///
/// ## Rules
/// - Must not be empty or whitespace
/// - At most 64 characters
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if id.len() > MAX_ID_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_ID_LEN,
        });
    }

    Ok(())
}

/// Validates a movement reason.
///
/// ## Rules
/// - Required unless `required` is false
/// - At most `max_len` characters
///
/// ## Returns
/// The trimmed reason.
pub fn validate_reason(reason: &str, max_len: usize, required: bool) -> ValidationResult<String> {
    let reason = reason.trim();

    if required && reason.is_empty() {
        return Err(ValidationError::Required {
            field: "reason".to_string(),
        });
    }

    if reason.chars().count() > max_len {
        return Err(ValidationError::TooLong {
            field: "reason".to_string(),
            max: max_len,
        });
    }

    Ok(reason.to_string())
}

/// Validates optional notes; blank notes become `None`.
pub fn validate_notes(notes: Option<&str>) -> ValidationResult<Option<String>> {
    let Some(notes) = notes.map(str::trim).filter(|n| !n.is_empty()) else {
        return Ok(None);
    };

    if notes.chars().count() > MAX_NOTES_LEN {
        return Err(ValidationError::TooLong {
            field: "notes".to_string(),
            max: MAX_NOTES_LEN,
        });
    }

    Ok(Some(notes.to_string()))
}

/// Validates a bin location label; blank clears the label.
pub fn validate_location(location: &str) -> ValidationResult<Option<String>> {
    let location = location.trim();
    if location.is_empty() {
        return Ok(None);
    }

    if location.chars().count() > MAX_LOCATION_LEN {
        return Err(ValidationError::TooLong {
            field: "location".to_string(),
            max: MAX_LOCATION_LEN,
        });
    }

    Ok(Some(location.to_string()))
}

// =============================================================================
// Quantity Validators
// =============================================================================

/// Validates a signed adjustment delta.
///
/// ## Rules
/// - Must not be zero (`InvalidQuantity`)
/// - Magnitude at most MAX_QUANTITY
pub fn validate_delta(delta: i64) -> LedgerResult<()> {
    if delta == 0 || delta.checked_abs().map_or(true, |m| m > MAX_QUANTITY) {
        return Err(LedgerError::invalid_quantity("quantity_delta", delta));
    }

    Ok(())
}

/// Validates a quantity that must be strictly positive.
pub fn validate_positive_quantity(field: &str, qty: i64) -> LedgerResult<()> {
    if qty <= 0 || qty > MAX_QUANTITY {
        return Err(LedgerError::invalid_quantity(field, qty));
    }

    Ok(())
}

// =============================================================================
// Sale Validators
// =============================================================================

/// Validates a price in cents (zero allowed for free items).
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "unit_price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a line discount and returns the line total.
///
/// ## Rules
/// - Discount is non-negative
/// - Discount does not exceed `unit_price × quantity`
pub fn validate_line_pricing(unit_price: Money, quantity: i64, discount: Money) -> ValidationResult<Money> {
    validate_price_cents(unit_price.cents())?;

    let gross = unit_price
        .checked_multiply_quantity(quantity)
        .ok_or_else(|| ValidationError::OutOfRange {
            field: "line total".to_string(),
            min: 0,
            max: i64::MAX,
        })?;

    if discount.is_negative() || discount > gross {
        return Err(ValidationError::OutOfRange {
            field: "discount".to_string(),
            min: 0,
            max: gross.cents(),
        });
    }

    Ok(gross - discount)
}

/// Validates the number of lines in a sale.
pub fn validate_line_count(lines: usize) -> ValidationResult<()> {
    if lines == 0 {
        return Err(ValidationError::Required {
            field: "lines".to_string(),
        });
    }

    if lines > MAX_SALE_LINES {
        return Err(ValidationError::OutOfRange {
            field: "lines".to_string(),
            min: 1,
            max: MAX_SALE_LINES as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_id() {
        assert!(validate_id("product_id", "P1").is_ok());
        assert!(validate_id("product_id", "  ").is_err());
        assert!(validate_id("product_id", &"x".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_reason() {
        assert_eq!(validate_reason("  damage ", 500, true).unwrap(), "damage");
        assert!(validate_reason("", 500, true).is_err());
        assert_eq!(validate_reason("", 500, false).unwrap(), "");
        assert!(validate_reason(&"r".repeat(11), 10, true).is_err());
    }

    #[test]
    fn test_validate_notes_blank_is_none() {
        assert_eq!(validate_notes(Some("   ")).unwrap(), None);
        assert_eq!(validate_notes(None).unwrap(), None);
        assert_eq!(validate_notes(Some("crushed")).unwrap(), Some("crushed".into()));
    }

    #[test]
    fn test_validate_delta() {
        assert!(validate_delta(5).is_ok());
        assert!(validate_delta(-5).is_ok());
        assert!(matches!(
            validate_delta(0),
            Err(LedgerError::InvalidQuantity { value: 0, .. })
        ));
        assert!(validate_delta(i64::MIN).is_err());
        assert!(validate_delta(MAX_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_positive_quantity() {
        assert!(validate_positive_quantity("quantity", 1).is_ok());
        assert!(validate_positive_quantity("quantity", 0).is_err());
        assert!(validate_positive_quantity("quantity", -3).is_err());
    }

    #[test]
    fn test_validate_line_pricing() {
        let total =
            validate_line_pricing(Money::from_cents(250), 4, Money::from_cents(100)).unwrap();
        assert_eq!(total.cents(), 900);

        assert!(validate_line_pricing(Money::from_cents(250), 1, Money::from_cents(300)).is_err());
        assert!(validate_line_pricing(Money::from_cents(-1), 1, Money::zero()).is_err());
        assert!(validate_line_pricing(Money::from_cents(100), 1, Money::from_cents(-1)).is_err());
    }

    #[test]
    fn test_validate_line_count() {
        assert!(validate_line_count(1).is_ok());
        assert!(validate_line_count(0).is_err());
        assert!(validate_line_count(MAX_SALE_LINES + 1).is_err());
    }
}
