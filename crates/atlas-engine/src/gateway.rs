//! # Payment Gateway
//!
//! The card-charge collaborator, behind a trait so the engine never knows
//! which provider sits on the other side.
//!
//! ## Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  Card Charge Sequencing                                 │
//! │                                                                         │
//! │  reserve capacity (tx 1)                                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  gateway.charge(amount, token)     ← OUTSIDE any transaction           │
//! │       │                                                                 │
//! │       ├─ Ok(receipt)  → finalize (tx 2): entity + payment + ledger     │
//! │       │                                                                 │
//! │       └─ Err(..)      → release the reservation, surface the error     │
//! │                                                                         │
//! │  A successful charge can never lose its reservation; a failed one      │
//! │  never holds capacity.                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use thiserror::Error;

/// Gateway charge failures.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The card was declined; the member should try another method.
    #[error("Card declined: {0}")]
    Declined(String),

    /// The provider could not be reached or errored out.
    #[error("Gateway unavailable: {0}")]
    Unavailable(String),
}

/// Proof of a captured charge.
#[derive(Debug, Clone)]
pub struct ChargeReceipt {
    /// Provider-side charge reference, stored on the payment.
    pub reference: String,
}

/// A synchronous card-charge provider.
///
/// Implementations must be idempotent-safe from the engine's point of
/// view: the engine calls `charge` at most once per purchase attempt.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charges `amount_cents` against the tokenized card.
    async fn charge(&self, amount_cents: i64, card_token: &str)
        -> Result<ChargeReceipt, GatewayError>;
}
