//! # Validation Module
//!
//! Input validation utilities for the Atlas back-office.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Engine entry point (Rust)                                    │
//! │  ├── THIS MODULE: malformed input rejected before any mutation         │
//! │  └── Plan-rule checks (selector::check_explicit_selection)             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Reservation validator (SQL, inside the transaction)          │
//! │  └── Conditional UPDATEs re-check capacity at commit time              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK constraints (counter bounds, one linked entity)             │
//! │  ├── UNIQUE constraints (one ledger entry per payment)                 │
//! │  └── Foreign key constraints                                           │
//! │                                                                         │
//! │  Defense in depth: each layer catches a different failure mode         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::MAX_SALE_ITEM_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Identifier Validators
// =============================================================================

/// Validates a UUID string in the named field.
///
/// ## Example
/// ```rust
/// use atlas_core::validation::validate_id;
///
/// assert!(validate_id("plan_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_id("plan_id", "not-a-uuid").is_err());
/// ```
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

/// Validates an opaque reference string (member id, proof reference,
/// gateway token). Non-empty, bounded length.
pub fn validate_reference(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.len() > 255 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 255,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a sale line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_SALE_ITEM_QUANTITY
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_SALE_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_SALE_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates an amount in cents that must be strictly positive
/// (a payment cannot move zero or negative money).
pub fn validate_amount_cents(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates a slot-id selection: non-empty, valid UUIDs, no duplicates.
///
/// Duplicates matter because the reservation validator increments the
/// counter once per listed id - a duplicate would book the same slot twice.
pub fn validate_slot_selection(slot_ids: &[String]) -> ValidationResult<()> {
    if slot_ids.is_empty() {
        return Err(ValidationError::Empty {
            field: "slot_ids".to_string(),
        });
    }

    for (i, id) in slot_ids.iter().enumerate() {
        validate_id("slot_ids", id)?;
        if slot_ids[..i].contains(id) {
            return Err(ValidationError::Duplicate {
                field: "slot_ids".to_string(),
                value: id.clone(),
            });
        }
    }

    Ok(())
}

/// Validates sale lines: non-empty, valid product ids, positive quantities,
/// no product listed twice (merge quantities instead of repeating lines).
pub fn validate_sale_lines(lines: &[(String, i64)]) -> ValidationResult<()> {
    if lines.is_empty() {
        return Err(ValidationError::Empty {
            field: "items".to_string(),
        });
    }

    for (i, (product_id, qty)) in lines.iter().enumerate() {
        validate_id("items.product_id", product_id)?;
        validate_quantity(*qty)?;
        if lines[..i].iter().any(|(p, _)| p == product_id) {
            return Err(ValidationError::Duplicate {
                field: "items.product_id".to_string(),
                value: product_id.clone(),
            });
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const ID_A: &str = "550e8400-e29b-41d4-a716-446655440000";
    const ID_B: &str = "550e8400-e29b-41d4-a716-446655440001";

    #[test]
    fn test_validate_id() {
        assert!(validate_id("plan_id", ID_A).is_ok());
        assert!(validate_id("plan_id", "").is_err());
        assert!(validate_id("plan_id", "123").is_err());
    }

    #[test]
    fn test_validate_reference() {
        assert!(validate_reference("proof", "uploads/transfer-123.png").is_ok());
        assert!(validate_reference("proof", "  ").is_err());
        assert!(validate_reference("proof", &"x".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_amount_cents() {
        assert!(validate_amount_cents(4500).is_ok());
        assert!(validate_amount_cents(0).is_err());
        assert!(validate_amount_cents(-100).is_err());
    }

    #[test]
    fn test_validate_slot_selection() {
        assert!(validate_slot_selection(&[ID_A.to_string(), ID_B.to_string()]).is_ok());
        assert!(validate_slot_selection(&[]).is_err());
        assert!(validate_slot_selection(&[ID_A.to_string(), ID_A.to_string()]).is_err());
        assert!(validate_slot_selection(&["nope".to_string()]).is_err());
    }

    #[test]
    fn test_validate_sale_lines() {
        assert!(validate_sale_lines(&[(ID_A.to_string(), 2)]).is_ok());
        assert!(validate_sale_lines(&[]).is_err());
        assert!(validate_sale_lines(&[(ID_A.to_string(), 0)]).is_err());
        assert!(
            validate_sale_lines(&[(ID_A.to_string(), 1), (ID_A.to_string(), 2)]).is_err()
        );
    }
}
