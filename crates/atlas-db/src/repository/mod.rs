//! # Repository Module
//!
//! Database repositories for all Atlas entities.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Layer                                     │
//! │                                                                         │
//! │  Orchestration (atlas-engine)                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐                  │
//! │  │ PlanRepo     │  │ CheckoutRepo │  │ DecisionRepo │  ...             │
//! │  │              │  │              │  │              │                  │
//! │  │ - get_by_id  │  │ - pending    │  │ - apply      │                  │
//! │  │ - list       │  │ - card       │  │ - audit      │                  │
//! │  └──────────────┘  └──────────────┘  └──────────────┘                  │
//! │       │                  │                  │                           │
//! │       └──────────────────┴──────────────────┘                           │
//! │                          ▼                                              │
//! │                     SqlitePool                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Transactional Boundaries
//! Every multi-statement mutation lives here, never in callers. A checkout
//! or a decision is exactly one transaction; the capacity ledger moves only
//! through the guarded statements in [`capacity`].

pub mod capacity;
pub mod checkout;
pub mod decision;
pub mod ledger;
pub mod membership;
pub mod payment;
pub mod plan;
pub mod product;
pub mod sale;
pub mod slot;

pub use capacity::CapacityRepository;
pub use checkout::{
    CheckoutRepository, MembershipCheckout, MembershipDraft, PricedLine, SaleCheckout, SaleDraft,
    SaleLine,
};
pub use decision::DecisionRepository;
pub use ledger::LedgerRepository;
pub use membership::MembershipRepository;
pub use payment::PaymentRepository;
pub use plan::{NewPlan, PlanRepository};
pub use product::{NewProduct, ProductRepository};
pub use sale::SaleRepository;
pub use slot::{NewSlot, SlotRepository};
