//! # Error Types
//!
//! Domain-specific error types for atlas-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  atlas-core errors (this file)                                         │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  atlas-db errors (separate crate)                                      │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  atlas-engine errors (separate crate)                                  │
//! │  └── EngineError      - What orchestrator callers see                  │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → EngineError → Caller    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (plan id, slot id, etc.)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use thiserror::Error;

use crate::types::Weekday;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations raised before any
/// mutation is attempted; capacity conflicts detected at commit time are a
/// separate, structured outcome (see `ReservationOutcome`).
#[derive(Debug, Error)]
pub enum CoreError {
    /// Plan cannot be found or is no longer offered.
    #[error("Plan not found: {0}")]
    PlanNotFound(String),

    /// A proposed slot selection breaks the plan's rules.
    ///
    /// ## When This Occurs
    /// - A slot's weekday is outside `allowed_days`
    /// - More than `max_slots_per_day` slots on one day
    /// - More than `max_reservations_per_week` slots in total
    #[error("Selection violates plan rules: {reason}")]
    SelectionViolatesPlan { reason: String },

    /// The plan has no reservable slots left to auto-select from.
    #[error("No reservable slots available for plan {plan_id}")]
    NoSlotsAvailable { plan_id: String },

    /// Weekday is not open for the plan.
    #[error("Plan {plan_id} does not allow reservations on {weekday}")]
    DayNotAllowed { plan_id: String, weekday: Weekday },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before business logic runs; a validation
/// failure guarantees nothing was mutated.
#[derive(Debug, Error)]
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

    /// Invalid format (e.g. invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// The same value appears twice where it must not.
    #[error("{field} contains duplicate value '{value}'")]
    Duplicate { field: String, value: String },

    /// An empty collection where at least one element is required.
    #[error("{field} must not be empty")]
    Empty { field: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
