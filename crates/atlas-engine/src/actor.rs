//! # Actors and Capabilities
//!
//! Who is performing an operation and what they are allowed to do.
//!
//! The engine does not do authentication - callers arrive with an already
//! established [`Actor`]. What the engine DOES enforce is capability:
//! ringing up purchases and deciding payments are separate permissions, so
//! a front-desk account cannot confirm its own cash payments unless it was
//! explicitly granted the decision capability.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// A permission an actor may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// May create purchases (memberships and sales).
    Sell,
    /// May confirm, reject, or cancel pending payments.
    DecidePayments,
}

/// The staff member (or system identity) performing an operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    /// Opaque staff identifier, recorded in audit trails.
    pub id: String,
    pub capabilities: Vec<Capability>,
}

impl Actor {
    pub fn new(id: impl Into<String>, capabilities: Vec<Capability>) -> Self {
        Actor {
            id: id.into(),
            capabilities,
        }
    }

    /// A front-desk account: sells, does not decide.
    pub fn seller(id: impl Into<String>) -> Self {
        Actor::new(id, vec![Capability::Sell])
    }

    /// A manager account: sells and decides.
    pub fn manager(id: impl Into<String>) -> Self {
        Actor::new(id, vec![Capability::Sell, Capability::DecidePayments])
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Errors with [`EngineError::Forbidden`] unless the capability is held.
    pub fn require(&self, capability: Capability, action: &str) -> EngineResult<()> {
        if self.can(capability) {
            Ok(())
        } else {
            Err(EngineError::Forbidden {
                actor: self.id.clone(),
                action: action.to_string(),
            })
        }
    }
}
