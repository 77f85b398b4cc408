//! # Domain Types
//!
//! Core domain types used throughout the Atlas back-office.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Plan        │   │  ScheduleSlot   │   │   Membership    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  allowed_days   │   │  weekday        │   │  plan_id (FK)   │       │
//! │  │  weekly caps    │   │  capacity       │   │  status         │       │
//! │  │  price_cents    │   │  reserved_count │   │  start/end date │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │   LocalSale     │   │    Payment      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  stock_quantity │   │  items (frozen) │   │  method/status  │       │
//! │  │  min_stock      │   │  status         │   │  linked entity  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  Payment ──1:0..1── FinancialMovement (income ledger, UNIQUE)          │
//! │  Payment ──1:N───── PaymentAuditRecord (who decided what, when)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has an immutable UUID v4 `id` used for relations; products
//! additionally carry a human-readable `sku`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Weekday
// =============================================================================

/// Day of the week a schedule slot belongs to.
///
/// ## Priority Order
/// The auto-selector fills schedules weekdays-first: Monday through Friday,
/// then Saturday, then Sunday. [`Weekday::PRIORITY`] encodes that order;
/// [`Weekday::ALL`] is plain calendar order for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    /// Calendar order, Monday first.
    pub const ALL: [Weekday; 7] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ];

    /// Auto-selector fill order: weekdays before the weekend.
    pub const PRIORITY: [Weekday; 7] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ];

    /// Lowercase name, matching the persisted representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Weekday::Monday => "monday",
            Weekday::Tuesday => "tuesday",
            Weekday::Wednesday => "wednesday",
            Weekday::Thursday => "thursday",
            Weekday::Friday => "friday",
            Weekday::Saturday => "saturday",
            Weekday::Sunday => "sunday",
        }
    }
}

impl std::fmt::Display for Weekday {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Weekday {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monday" => Ok(Weekday::Monday),
            "tuesday" => Ok(Weekday::Tuesday),
            "wednesday" => Ok(Weekday::Wednesday),
            "thursday" => Ok(Weekday::Thursday),
            "friday" => Ok(Weekday::Friday),
            "saturday" => Ok(Weekday::Saturday),
            "sunday" => Ok(Weekday::Sunday),
            other => Err(format!("unknown weekday: {other}")),
        }
    }
}

// =============================================================================
// Plan
// =============================================================================

/// A membership plan: price plus the scheduling rules a membership under it
/// must honor.
///
/// Immutable once referenced by active memberships; plan changes are new
/// plan rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name shown to staff ("Full Access", "Mornings Only", ...).
    pub name: String,

    /// Monthly price in cents.
    pub price_cents: i64,

    /// Weekdays a membership under this plan may reserve.
    pub allowed_days: Vec<Weekday>,

    /// Maximum slots a membership may reserve on a single day.
    pub max_slots_per_day: i64,

    /// Maximum slots a membership may reserve across the whole week.
    pub max_reservations_per_week: i64,

    /// Total memberships the plan may carry.
    pub total_capacity: i64,

    /// Memberships currently counted against `total_capacity`.
    ///
    /// Maintained by the capacity ledger with the same conditional
    /// reserve/release statements as `ScheduleSlot::reserved_count`.
    pub member_count: i64,

    /// Whether the plan is currently offered (soft delete).
    pub is_active: bool,

    /// When the plan was created.
    pub created_at: DateTime<Utc>,
}

impl Plan {
    /// Returns the plan price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Whether the plan has room for another member.
    ///
    /// Advisory only; the authoritative check is the guarded claim in the
    /// capacity ledger.
    #[inline]
    pub fn has_capacity(&self) -> bool {
        self.member_count < self.total_capacity
    }

    /// Whether the plan allows reserving on the given weekday.
    pub fn allows_day(&self, day: Weekday) -> bool {
        self.allowed_days.contains(&day)
    }
}

// =============================================================================
// Schedule Slot
// =============================================================================

/// A capacity-bounded (weekday, time-range) unit of the weekly schedule.
///
/// `reserved_count` is the capacity ledger: it only ever moves through the
/// conditional reserve/release statements in the database layer, which keep
/// `0 <= reserved_count <= capacity` at every observable instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ScheduleSlot {
    pub id: String,
    pub weekday: Weekday,
    /// Opening time as minutes since midnight (e.g. 390 = 06:30).
    pub opens_at_min: i64,
    /// Closing time as minutes since midnight.
    pub closes_at_min: i64,
    pub capacity: i64,
    pub reserved_count: i64,
    pub created_at: DateTime<Utc>,
}

impl ScheduleSlot {
    /// Units still reservable right now.
    #[inline]
    pub fn available(&self) -> i64 {
        (self.capacity - self.reserved_count).max(0)
    }

    /// Opening time formatted "HH:MM" for receipts and logs.
    pub fn opens_label(&self) -> String {
        format!("{:02}:{:02}", self.opens_at_min / 60, self.opens_at_min % 60)
    }
}

// =============================================================================
// Membership
// =============================================================================

/// The status of a membership.
///
/// Created as `pending_cash`/`pending_transfer` (deferred payment) or
/// directly `active` (card). Only the confirmation engine moves it to
/// `active` or `cancelled`; the expiry sweep (external) moves it to
/// `expired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    PendingCash,
    PendingTransfer,
    Active,
    Cancelled,
    Expired,
}

/// A member's subscription to a plan, with a reserved weekly schedule.
///
/// The reserved slots live in the `membership_slots` join table; fetch them
/// through the membership repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Membership {
    pub id: String,
    pub plan_id: String,
    /// The person this membership belongs to (opaque to the core).
    pub member_id: String,
    pub status: MembershipStatus,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Product
// =============================================================================

/// A retail product sold at the front desk.
///
/// `stock_quantity` is the stock side of the capacity ledger: it is
/// decremented exactly once per sale at sale-creation time, independent of
/// whether money has been collected yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: String,
    /// Stock Keeping Unit - business identifier.
    pub sku: String,
    pub name: String,
    pub price_cents: i64,
    pub stock_quantity: i64,
    /// Restock threshold for the low-stock report.
    pub min_stock: i64,
    /// Whether product is active (soft delete).
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Whether stock has fallen to or below the restock threshold.
    #[inline]
    pub fn is_below_min_stock(&self) -> bool {
        self.stock_quantity <= self.min_stock
    }
}

// =============================================================================
// Local Sale
// =============================================================================

/// The status of a local (front-desk) sale.
///
/// Mirrors the membership pending convention: deferred-payment sales sit in
/// a `pending_*` state with their stock already provisionally sold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    PendingCash,
    PendingTransfer,
    Completed,
    Cancelled,
}

/// A front-desk retail sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct LocalSale {
    pub id: String,
    pub status: SaleStatus,
    pub payment_method: PaymentMethod,
    pub total_cents: i64,
    /// Staff member who rang up the sale.
    pub sold_by: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A line item in a sale.
/// Uses snapshot pattern to freeze product data at time of sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    /// SKU at time of sale (frozen).
    pub sku_snapshot: String,
    /// Product name at time of sale (frozen).
    pub name_snapshot: String,
    /// Unit price in cents at time of sale (frozen).
    pub unit_price_cents: i64,
    pub quantity: i64,
    /// Line total (unit_price × quantity).
    pub line_total_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl SaleItem {
    /// Returns the line total as Money.
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

// =============================================================================
// Payment
// =============================================================================

/// How a payment is (or will be) collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash handed to staff; confirmed by staff attestation.
    Cash,
    /// Bank transfer; requires an uploaded proof reference to confirm.
    Transfer,
    /// Card captured synchronously through the gateway; never pending.
    Card,
}

/// The status of a payment.
///
/// Transitions are monotonic and terminal:
/// `pending → completed` or `pending → cancelled`, never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Cancelled,
}

impl PaymentStatus {
    /// Terminal statuses accept no further decisions.
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Completed | PaymentStatus::Cancelled)
    }
}

/// A payment for exactly one membership or one local sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Payment {
    pub id: String,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub amount_cents: i64,
    /// Set iff this payment funds a membership.
    pub membership_id: Option<String>,
    /// Set iff this payment funds a local sale.
    pub sale_id: Option<String>,
    /// Opaque reference to an uploaded transfer proof.
    pub proof_reference: Option<String>,
    /// Gateway charge reference (card only).
    pub gateway_reference: Option<String>,
    /// Staff member (or "gateway") that decided this payment.
    pub decided_by: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decision_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Returns the payment amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    /// The entity this payment funds.
    pub fn linked_entity(&self) -> LinkedEntity {
        match (&self.membership_id, &self.sale_id) {
            (Some(id), _) => LinkedEntity::Membership(id.clone()),
            (_, Some(id)) => LinkedEntity::Sale(id.clone()),
            // The database CHECK constraint guarantees exactly one link.
            (None, None) => unreachable!("payment without linked entity"),
        }
    }
}

/// Which entity a payment funds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkedEntity {
    Membership(String),
    Sale(String),
}

// =============================================================================
// Financial Ledger
// =============================================================================

/// The kind of a financial movement. The core only ever records income;
/// the enum leaves room for the accountant-facing collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Income,
}

/// One confirmed monetary movement.
///
/// Invariant: a movement exists if and only if its payment reached
/// `completed`, and `payment_id` is UNIQUE - at most one movement per
/// payment, enforced by the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct FinancialMovement {
    pub id: String,
    pub payment_id: String,
    pub kind: MovementKind,
    pub amount_cents: i64,
    pub recorded_at: DateTime<Utc>,
}

// =============================================================================
// Payment Audit
// =============================================================================

/// What happened to a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    Confirmed,
    Rejected,
    Cancelled,
}

/// One entry in a payment's audit trail: every creation and every decision,
/// with its actor and reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PaymentAuditRecord {
    pub id: String,
    pub payment_id: String,
    pub action: AuditAction,
    pub actor: String,
    pub reason: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

// =============================================================================
// Reservation Outcomes
// =============================================================================

/// Why a proposed reservation unit could not be committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictResource {
    /// A schedule slot that is full (or fuller than the request needs).
    Slot { slot_id: String, weekday: Weekday },
    /// A product without enough stock.
    Product { product_id: String, sku: String },
    /// A plan whose member cap is reached.
    Plan { plan_id: String },
}

/// A single item of a reservation conflict list: which resource failed, how
/// much was asked for, and how much was actually left at commit time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityConflict {
    pub resource: ConflictResource,
    pub requested: i64,
    pub available: i64,
}

/// Result of an all-or-nothing check-then-commit against the capacity
/// ledger. On `Conflict` nothing was mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservationOutcome {
    Committed,
    Conflict(Vec<CapacityConflict>),
}

impl ReservationOutcome {
    #[inline]
    pub fn is_committed(&self) -> bool {
        matches!(self, ReservationOutcome::Committed)
    }
}

// =============================================================================
// Decision Outcomes
// =============================================================================

/// A staff (or gateway) decision on a pending payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Money was received: complete the payment, write the ledger entry,
    /// activate the linked entity.
    Confirm { note: Option<String> },
    /// Staff refused the payment (e.g. bad transfer proof).
    Reject { reason: String },
    /// The purchase was called off before settlement.
    Cancel { reason: String },
}

impl Decision {
    /// The terminal status this decision drives the payment to.
    pub const fn target_status(&self) -> PaymentStatus {
        match self {
            Decision::Confirm { .. } => PaymentStatus::Completed,
            Decision::Reject { .. } | Decision::Cancel { .. } => PaymentStatus::Cancelled,
        }
    }

    /// The audit action recorded for this decision.
    pub const fn audit_action(&self) -> AuditAction {
        match self {
            Decision::Confirm { .. } => AuditAction::Confirmed,
            Decision::Reject { .. } => AuditAction::Rejected,
            Decision::Cancel { .. } => AuditAction::Cancelled,
        }
    }
}

/// Result of applying a [`Decision`] as one atomic unit.
#[derive(Debug, Clone)]
pub enum DecisionOutcome {
    /// The compare-and-set won; the payment and everything linked to it
    /// were updated in the same transaction.
    Applied(Payment),
    /// The payment had already reached a terminal status; nothing was
    /// mutated. Carries who decided it and when, for support/audit.
    AlreadyProcessed {
        payment_id: String,
        status: PaymentStatus,
        decided_by: Option<String>,
        decided_at: Option<DateTime<Utc>>,
    },
    /// Confirm on a transfer payment with no proof attached; rolled back.
    MissingProof { payment_id: String },
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weekday_roundtrip() {
        for day in Weekday::ALL {
            let parsed: Weekday = day.as_str().parse().unwrap();
            assert_eq!(parsed, day);
        }
        assert!("someday".parse::<Weekday>().is_err());
    }

    #[test]
    fn test_priority_order_puts_weekend_last() {
        assert_eq!(Weekday::PRIORITY[5], Weekday::Saturday);
        assert_eq!(Weekday::PRIORITY[6], Weekday::Sunday);
    }

    #[test]
    fn test_slot_available_clamps_at_zero() {
        let slot = ScheduleSlot {
            id: "s1".to_string(),
            weekday: Weekday::Monday,
            opens_at_min: 390,
            closes_at_min: 450,
            capacity: 10,
            reserved_count: 12,
            created_at: Utc::now(),
        };
        assert_eq!(slot.available(), 0);
        assert_eq!(slot.opens_label(), "06:30");
    }

    #[test]
    fn test_payment_status_terminal() {
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(PaymentStatus::Completed.is_terminal());
        assert!(PaymentStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_decision_targets() {
        let confirm = Decision::Confirm { note: None };
        assert_eq!(confirm.target_status(), PaymentStatus::Completed);
        assert_eq!(confirm.audit_action(), AuditAction::Confirmed);

        let reject = Decision::Reject {
            reason: "no proof".to_string(),
        };
        assert_eq!(reject.target_status(), PaymentStatus::Cancelled);
        assert_eq!(reject.audit_action(), AuditAction::Rejected);
    }

    #[test]
    fn test_product_low_stock() {
        let product = Product {
            id: "p1".to_string(),
            sku: "SHAKE-CHOC".to_string(),
            name: "Chocolate Shake".to_string(),
            price_cents: 299,
            stock_quantity: 3,
            min_stock: 5,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(product.is_below_min_stock());
    }
}
