//! # atlas-engine: Orchestration Layer
//!
//! Ties the pure rules (atlas-core) and the atomic persistence (atlas-db)
//! together with the outside world.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        atlas-engine                                     │
//! │                                                                         │
//! │  ┌────────────────────┐      ┌────────────────────┐                    │
//! │  │  CheckoutService   │      │ ConfirmationEngine │                    │
//! │  │                    │      │                    │                    │
//! │  │  availability      │      │  confirm / reject  │                    │
//! │  │  purchase (branch  │      │  cancel pending    │                    │
//! │  │  on method)        │      │  pending queue     │                    │
//! │  │  create sale       │      │  audit trail       │                    │
//! │  │  proof attachment  │      │                    │                    │
//! │  └─────────┬──────────┘      └─────────┬──────────┘                    │
//! │            │                           │                               │
//! │       ┌────┴─────────┬─────────────────┴────┐                          │
//! │       ▼              ▼                      ▼                          │
//! │  atlas-db      PaymentGateway           Notifier                       │
//! │  (atomic txs)  (card charges,           (post-commit,                  │
//! │                outside any tx)          best-effort)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Sequencing Rules
//! 1. External calls (gateway, notifier) never run inside a database
//!    transaction.
//! 2. Card: reserve → charge → finalize. A failed charge releases its
//!    reservation; a successful charge never loses it.
//! 3. Capacity conflicts and duplicate decisions are values, not errors.

pub mod actor;
pub mod checkout;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod notify;

#[cfg(test)]
pub(crate) mod support;

pub use actor::{Actor, Capability};
pub use checkout::{CheckoutService, MembershipPurchase, SaleRequest, ScheduleChoice};
pub use engine::ConfirmationEngine;
pub use error::{EngineError, EngineResult};
pub use gateway::{ChargeReceipt, GatewayError, PaymentGateway};
pub use notify::{NotificationEvent, Notifier, NotifyError, NullNotifier};
