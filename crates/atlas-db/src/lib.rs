//! # atlas-db: Database Layer
//!
//! SQLite persistence for the Atlas back-office.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        atlas-db                                         │
//! │                                                                         │
//! │  ┌──────────────┐  ┌──────────────────────────────────────────────┐    │
//! │  │   pool.rs    │  │              repository/                     │    │
//! │  │              │  │                                              │    │
//! │  │  DbConfig    │  │  plan      slot      product   (catalog)     │    │
//! │  │  Database    │──│  membership  sale    payment   (reads)       │    │
//! │  │              │  │  capacity  checkout  decision  (atomic)      │    │
//! │  └──────────────┘  │  ledger                        (income)      │    │
//! │  ┌──────────────┐  └──────────────────────────────────────────────┘    │
//! │  │ migrations.rs│                                                       │
//! │  │ (embedded)   │  Every transactional boundary lives in this crate.   │
//! │  └──────────────┘                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::{
    CapacityRepository, CheckoutRepository, DecisionRepository, LedgerRepository,
    MembershipCheckout, MembershipDraft, MembershipRepository, NewPlan, NewProduct, NewSlot,
    PaymentRepository, PlanRepository, PricedLine, ProductRepository, SaleCheckout, SaleDraft,
    SaleLine,
    SaleRepository, SlotRepository,
};
