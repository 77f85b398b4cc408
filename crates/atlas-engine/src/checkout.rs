//! # Checkout Service
//!
//! Purchase orchestration: membership purchases and front-desk sales, with
//! the payment-method branch.
//!
//! ## Method Branching
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     purchase / create_sale                              │
//! │                                                                         │
//! │  validate input ──► load plan / lines ──► check plan rules             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌──────────── method? ────────────┐                                   │
//! │  │                                 │                                   │
//! │  ▼ cash / transfer                 ▼ card                              │
//! │  one transaction:                  tx 1: reserve capacity              │
//! │    reserve + pending entity        gateway.charge (no tx held)         │
//! │    + pending payment + audit       tx 2: active entity + completed     │
//! │                                          payment + ledger + audit      │
//! │  money arrives later, via the      charge failed → release, error     │
//! │  confirmation engine                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Capacity conflicts come back as values, not errors - the caller shows
//! the member which slots or products ran out and lets them re-pick.

use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use tracing::{info, warn};

use atlas_core::validation::{
    validate_id, validate_reference, validate_sale_lines, validate_slot_selection,
};
use atlas_core::{
    availability::week_availability, selector, Payment, PaymentMethod, SlotAvailability,
    WeekAvailability, MEMBERSHIP_TERM_DAYS,
};
use atlas_db::{
    Database, MembershipCheckout, MembershipDraft, PricedLine, SaleCheckout, SaleDraft, SaleLine,
};

use crate::actor::{Actor, Capability};
use crate::error::{EngineError, EngineResult};
use crate::gateway::PaymentGateway;
use crate::notify::{NotificationEvent, Notifier};

// =============================================================================
// Requests
// =============================================================================

/// How the weekly schedule for a membership purchase is chosen.
#[derive(Debug, Clone)]
pub enum ScheduleChoice {
    /// Let the auto-selector fill the week.
    Auto,
    /// The member picked these slot ids.
    Explicit(Vec<String>),
}

/// A membership purchase request.
#[derive(Debug, Clone)]
pub struct MembershipPurchase {
    pub plan_id: String,
    pub member_id: String,
    pub schedule: ScheduleChoice,
    pub method: PaymentMethod,
    /// Tokenized card; required iff `method == Card`.
    pub card_token: Option<String>,
    /// Transfer proof already in hand; only valid for transfer payments.
    pub proof_reference: Option<String>,
    pub start_date: NaiveDate,
}

/// A front-desk sale request.
#[derive(Debug, Clone)]
pub struct SaleRequest {
    /// (product_id, quantity) lines; one line per product.
    pub lines: Vec<(String, i64)>,
    pub method: PaymentMethod,
    pub card_token: Option<String>,
    /// Transfer proof already in hand; only valid for transfer payments.
    pub proof_reference: Option<String>,
    pub notes: Option<String>,
}

// =============================================================================
// Service
// =============================================================================

/// Orchestrates purchases over the database, gateway, and notifier.
#[derive(Clone)]
pub struct CheckoutService {
    db: Database,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
}

impl CheckoutService {
    pub fn new(db: Database, gateway: Arc<dyn PaymentGateway>, notifier: Arc<dyn Notifier>) -> Self {
        CheckoutService {
            db,
            gateway,
            notifier,
        }
    }

    /// The weekly availability map for a plan, for display and slot
    /// picking.
    ///
    /// Advisory numbers: the checkout transaction re-checks capacity, so a
    /// member working from a stale view gets a conflict, never an
    /// over-booking.
    pub async fn plan_availability(&self, plan_id: &str) -> EngineResult<WeekAvailability> {
        validate_id("plan_id", plan_id).map_err(|e| EngineError::Validation(e.to_string()))?;

        let plan = self.db.plans().get_by_id(plan_id).await?;
        let slots = self.db.slots().list_all().await?;
        Ok(week_availability(&plan, &slots))
    }

    /// Purchases a membership.
    ///
    /// ## Flow
    /// 1. Capability + input validation
    /// 2. Plan rules: active, capacity, schedule selection (auto or checked
    ///    explicit)
    /// 3. Method branch: pending checkout (cash/transfer) or
    ///    reserve-charge-finalize (card)
    pub async fn purchase_membership(
        &self,
        actor: &Actor,
        request: MembershipPurchase,
    ) -> EngineResult<MembershipCheckout> {
        actor.require(Capability::Sell, "purchase membership")?;
        validate_id("plan_id", &request.plan_id)
            .map_err(|e| EngineError::Validation(e.to_string()))?;
        validate_reference("member_id", &request.member_id)
            .map_err(|e| EngineError::Validation(e.to_string()))?;
        check_proof(request.method, request.proof_reference.as_deref())?;

        let plan = self.db.plans().get_by_id(&request.plan_id).await?;
        if !plan.is_active {
            return Err(EngineError::PlanRules(format!(
                "plan '{}' is no longer offered",
                plan.name
            )));
        }

        // Early, friendly refusal; the checkout transaction makes the
        // authoritative claim against the member cap.
        if !plan.has_capacity() {
            return Err(EngineError::PlanRules(format!(
                "plan '{}' is at capacity ({})",
                plan.name, plan.total_capacity
            )));
        }

        // Pick the schedule against a fresh availability snapshot.
        let slots = self.db.slots().list_all().await?;
        let week = week_availability(&plan, &slots);
        let selection = match &request.schedule {
            ScheduleChoice::Auto => selector::auto_select(&plan, &week)?,
            ScheduleChoice::Explicit(slot_ids) => {
                validate_slot_selection(slot_ids)
                    .map_err(|e| EngineError::Validation(e.to_string()))?;
                let selection = resolve_selection(&week, slot_ids)?;
                selector::check_explicit_selection(&plan, &selection)?;
                selection
            }
        };
        let slot_ids: Vec<String> = selection.iter().map(|s| s.slot_id.clone()).collect();

        let end_date = request.start_date + Duration::days(MEMBERSHIP_TERM_DAYS);
        let draft = MembershipDraft {
            plan_id: plan.id.clone(),
            member_id: request.member_id.clone(),
            slot_ids: slot_ids.clone(),
            method: request.method,
            amount_cents: plan.price_cents,
            start_date: request.start_date,
            end_date: Some(end_date),
            proof_reference: request.proof_reference.clone(),
            actor: actor.id.clone(),
        };

        match request.method {
            PaymentMethod::Cash | PaymentMethod::Transfer => {
                let outcome = self.db.checkout().create_pending_membership(draft).await?;
                if let MembershipCheckout::Created { payment, .. } = &outcome {
                    self.emit(NotificationEvent::PaymentPending {
                        payment_id: payment.id.clone(),
                    })
                    .await;
                }
                Ok(outcome)
            }
            PaymentMethod::Card => {
                let card_token = request.card_token.as_deref().ok_or_else(|| {
                    EngineError::Validation("card_token is required for card payments".to_string())
                })?;
                validate_reference("card_token", card_token)
                    .map_err(|e| EngineError::Validation(e.to_string()))?;

                // Hold the slots and the plan seat, then charge. The charge
                // runs outside any transaction.
                match self
                    .db
                    .capacity()
                    .reserve_membership(&plan.id, &slot_ids)
                    .await?
                {
                    atlas_core::ReservationOutcome::Conflict(conflicts) => {
                        return Ok(MembershipCheckout::Conflict(conflicts));
                    }
                    atlas_core::ReservationOutcome::Committed => {}
                }

                info!(plan_id = %plan.id, amount = %plan.price(), "Charging card for membership");
                let receipt = match self.gateway.charge(plan.price_cents, card_token).await {
                    Ok(receipt) => receipt,
                    Err(err) => {
                        // Give the capacity back before surfacing the error.
                        self.db
                            .capacity()
                            .release_membership(&plan.id, &slot_ids)
                            .await?;
                        info!(plan_id = %plan.id, "Card charge failed, reservation released");
                        return Err(EngineError::Gateway(err.to_string()));
                    }
                };

                let outcome = self
                    .db
                    .checkout()
                    .finalize_card_membership(draft, &receipt.reference)
                    .await?;
                if let MembershipCheckout::Created { membership, .. } = &outcome {
                    self.emit(NotificationEvent::MembershipActivated {
                        membership_id: membership.id.clone(),
                        member_id: membership.member_id.clone(),
                    })
                    .await;
                }
                Ok(outcome)
            }
        }
    }

    /// Creates a front-desk sale.
    ///
    /// Stock leaves the shelf when the sale is rung up; deferred payments
    /// put the sale in a pending status for the confirmation engine.
    pub async fn create_sale(
        &self,
        actor: &Actor,
        request: SaleRequest,
    ) -> EngineResult<SaleCheckout> {
        actor.require(Capability::Sell, "create sale")?;
        validate_sale_lines(&request.lines)
            .map_err(|e| EngineError::Validation(e.to_string()))?;
        check_proof(request.method, request.proof_reference.as_deref())?;

        let draft = SaleDraft {
            lines: request
                .lines
                .iter()
                .map(|(product_id, quantity)| SaleLine {
                    product_id: product_id.clone(),
                    quantity: *quantity,
                })
                .collect(),
            method: request.method,
            proof_reference: request.proof_reference.clone(),
            sold_by: actor.id.clone(),
            notes: request.notes.clone(),
        };

        match request.method {
            PaymentMethod::Cash | PaymentMethod::Transfer => {
                let outcome = self.db.checkout().create_pending_sale(draft).await?;
                if let SaleCheckout::Created { payment, .. } = &outcome {
                    self.emit(NotificationEvent::PaymentPending {
                        payment_id: payment.id.clone(),
                    })
                    .await;
                }
                Ok(outcome)
            }
            PaymentMethod::Card => {
                let card_token = request.card_token.as_deref().ok_or_else(|| {
                    EngineError::Validation("card_token is required for card payments".to_string())
                })?;
                validate_reference("card_token", card_token)
                    .map_err(|e| EngineError::Validation(e.to_string()))?;

                match self.db.capacity().reserve_stock(&request.lines).await? {
                    atlas_core::ReservationOutcome::Conflict(conflicts) => {
                        return Ok(SaleCheckout::Conflict(conflicts));
                    }
                    atlas_core::ReservationOutcome::Committed => {}
                }

                // Price the lines once; the charge and the finalize both
                // work from this snapshot, so a catalog price change in
                // between cannot split the two amounts.
                let priced = match self.db.checkout().price_sale(&draft.lines).await {
                    Ok(priced) => priced,
                    Err(err) => {
                        self.db.capacity().release_stock(&request.lines).await?;
                        return Err(err.into());
                    }
                };
                let total = PricedLine::total(&priced);

                info!(amount = %total, "Charging card for sale");
                let receipt = match self.gateway.charge(total.cents(), card_token).await {
                    Ok(receipt) => receipt,
                    Err(err) => {
                        self.db.capacity().release_stock(&request.lines).await?;
                        info!("Card charge failed, stock restored");
                        return Err(EngineError::Gateway(err.to_string()));
                    }
                };

                let outcome = self
                    .db
                    .checkout()
                    .finalize_card_sale(draft, &priced, &receipt.reference)
                    .await?;
                if let SaleCheckout::Created { sale, .. } = &outcome {
                    self.emit(NotificationEvent::SaleCompleted {
                        sale_id: sale.id.clone(),
                    })
                    .await;
                }
                Ok(outcome)
            }
        }
    }

    /// Attaches (or replaces) the proof on a pending transfer payment.
    ///
    /// For members who pay first and bring the receipt later; the
    /// confirmation engine refuses to confirm a transfer without one.
    pub async fn attach_proof(
        &self,
        actor: &Actor,
        payment_id: &str,
        reference: &str,
    ) -> EngineResult<Payment> {
        actor.require(Capability::Sell, "attach transfer proof")?;
        validate_id("payment_id", payment_id)
            .map_err(|e| EngineError::Validation(e.to_string()))?;
        validate_reference("proof_reference", reference)
            .map_err(|e| EngineError::Validation(e.to_string()))?;

        Ok(self.db.payments().attach_proof(payment_id, reference).await?)
    }

    /// Fires a post-commit notification; failures are logged and dropped.
    async fn emit(&self, event: NotificationEvent) {
        if let Err(err) = self.notifier.notify(event.clone()).await {
            warn!(?event, %err, "Notification delivery failed");
        }
    }
}

/// A proof reference at creation is a transfer-only input.
fn check_proof(method: PaymentMethod, proof: Option<&str>) -> EngineResult<()> {
    match proof {
        None => Ok(()),
        Some(reference) if method == PaymentMethod::Transfer => {
            validate_reference("proof_reference", reference)
                .map_err(|e| EngineError::Validation(e.to_string()))
        }
        Some(_) => Err(EngineError::Validation(
            "proof_reference only applies to transfer payments".to_string(),
        )),
    }
}

/// Maps explicit slot ids to their availability entries.
fn resolve_selection(
    week: &WeekAvailability,
    slot_ids: &[String],
) -> EngineResult<Vec<SlotAvailability>> {
    let mut selection = Vec::with_capacity(slot_ids.len());
    for slot_id in slot_ids {
        let found = week
            .days
            .iter()
            .flat_map(|d| d.slots.iter())
            .find(|s| &s.slot_id == slot_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound {
                entity: "ScheduleSlot".to_string(),
                id: slot_id.clone(),
            })?;
        selection.push(found);
    }
    Ok(selection)
}

// =============================================================================
// Unit Tests
// =============================================================================
