//! # atlas-core: Pure Business Logic for the Atlas Back-Office
//!
//! This crate is the **heart** of the Atlas gym back-office. It contains all
//! business logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Atlas Back-Office Architecture                      │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Callers (HTTP surface, staff tools)             │   │
//! │  │        purchase_membership, create_sale, confirm_payment        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 atlas-engine (Orchestration)                    │   │
//! │  │   payment intents, confirmation engine, gateway, notifications │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ atlas-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐ ┌───────────┐ ┌──────────────┐ ┌───────────┐  │   │
//! │  │   │   types   │ │   money   │ │ availability │ │ selector  │  │   │
//! │  │   │ Plan Slot │ │   Money   │ │  week calc   │ │ auto-pick │  │   │
//! │  │   │  Payment  │ │  (cents)  │ │  (pure read) │ │ (determ.) │  │   │
//! │  │   └───────────┘ └───────────┘ └──────────────┘ └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    atlas-db (Database Layer)                    │   │
//! │  │        SQLite repositories, atomic checkout and decisions       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Plan, ScheduleSlot, Payment, etc.)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//! - [`availability`] - Slot Availability Calculator (pure read)
//! - [`selector`] - Schedule Auto-Selector (deterministic heuristic)
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64) to avoid float errors
//! 4. **Explicit Errors**: All errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod availability;
pub mod error;
pub mod money;
pub mod selector;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use atlas_core::Money` instead of
// `use atlas_core::money::Money`

pub use availability::{DayAvailability, SlotAvailability, WeekAvailability};
pub use error::{CoreError, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity of a single product on one sale line.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_SALE_ITEM_QUANTITY: i64 = 999;

/// Length of a membership term in days, fixed at purchase time.
///
/// ## Business Reason
/// Plans are monthly; the expiry sweep (an external collaborator) retires
/// memberships whose end date has passed.
pub const MEMBERSHIP_TERM_DAYS: i64 = 30;
