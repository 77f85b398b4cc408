//! # Engine Error Types
//!
//! The error surface callers of the orchestration layer see.
//!
//! Conflicts and already-processed decisions are NOT errors - they come
//! back as values ([`atlas_core::ReservationOutcome`],
//! [`atlas_core::DecisionOutcome`]) because staff act on their contents.
//! This enum covers the cases where the operation itself could not run.

use thiserror::Error;

use atlas_core::CoreError;
use atlas_db::DbError;

/// Errors from the orchestration layer.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Input failed validation before touching the database.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The plan's scheduling rules refuse the requested selection.
    #[error("Selection violates plan rules: {0}")]
    PlanRules(String),

    /// The acting staff member lacks the required capability.
    #[error("Actor '{actor}' is not allowed to {action}")]
    Forbidden { actor: String, action: String },

    /// The card gateway refused or failed the charge.
    #[error("Gateway charge failed: {0}")]
    Gateway(String),

    /// Database failure underneath an otherwise valid operation.
    #[error("Database error: {0}")]
    Db(#[from] DbError),
}

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::PlanNotFound(plan_id) => EngineError::NotFound {
                entity: "Plan".to_string(),
                id: plan_id,
            },
            CoreError::SelectionViolatesPlan { .. }
            | CoreError::NoSlotsAvailable { .. }
            | CoreError::DayNotAllowed { .. } => EngineError::PlanRules(err.to_string()),
            CoreError::Validation(v) => EngineError::Validation(v.to_string()),
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
