//! Test doubles and seed helpers shared by the engine's unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use atlas_core::Weekday;
use atlas_db::{Database, DbConfig, NewPlan, NewProduct, NewSlot};

use crate::checkout::CheckoutService;
use crate::gateway::{ChargeReceipt, GatewayError, PaymentGateway};
use crate::notify::{NotificationEvent, Notifier, NotifyError};

/// Gateway that approves everything and counts its charges.
pub struct FakeGateway {
    pub charges: Mutex<Vec<(i64, String)>>,
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn charge(
        &self,
        amount_cents: i64,
        card_token: &str,
    ) -> Result<ChargeReceipt, GatewayError> {
        let mut charges = self.charges.lock().unwrap();
        charges.push((amount_cents, card_token.to_string()));
        Ok(ChargeReceipt {
            reference: format!("ch_test_{}", charges.len()),
        })
    }
}

/// Gateway that declines everything.
pub struct DecliningGateway;

#[async_trait]
impl PaymentGateway for DecliningGateway {
    async fn charge(
        &self,
        _amount_cents: i64,
        _card_token: &str,
    ) -> Result<ChargeReceipt, GatewayError> {
        Err(GatewayError::Declined("insufficient funds".to_string()))
    }
}

/// Notifier that records events for assertions.
pub struct RecordingNotifier {
    pub events: Arc<Mutex<Vec<NotificationEvent>>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: NotificationEvent) -> Result<(), NotifyError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

pub fn recording_notifier() -> (Arc<dyn Notifier>, Arc<Mutex<Vec<NotificationEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let notifier = RecordingNotifier {
        events: events.clone(),
    };
    (Arc::new(notifier), events)
}

pub fn failing_gateway() -> Arc<dyn PaymentGateway> {
    Arc::new(DecliningGateway)
}

/// In-memory database + service wired with the approving fakes.
pub async fn test_service() -> (CheckoutService, Database) {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let gateway = Arc::new(FakeGateway {
        charges: Mutex::new(Vec::new()),
    });
    let (notifier, _) = recording_notifier();
    let service = CheckoutService::new(db.clone(), gateway, notifier);
    (service, db)
}

/// What [`seed_basic`] created.
pub struct Seeded {
    pub plan_id: String,
    /// Two Monday slots then one Wednesday slot, earliest first.
    pub slot_ids: Vec<String>,
    pub product_id: String,
}

/// Seeds one plan (1 slot/day, 3/week, Mon+Wed+Fri), three slots, and one
/// product with 5 units of stock at 350 cents.
pub async fn seed_basic(db: &Database) -> Seeded {
    let plan = db
        .plans()
        .create(NewPlan {
            name: "Mornings Only".to_string(),
            price_cents: 4_500,
            allowed_days: vec![Weekday::Monday, Weekday::Wednesday, Weekday::Friday],
            max_slots_per_day: 1,
            max_reservations_per_week: 3,
            total_capacity: 100,
        })
        .await
        .unwrap();

    let mut slot_ids = Vec::new();
    for (weekday, opens) in [
        (Weekday::Monday, 390),
        (Weekday::Monday, 450),
        (Weekday::Wednesday, 390),
    ] {
        let slot = db
            .slots()
            .create(NewSlot {
                weekday,
                opens_at_min: opens,
                closes_at_min: opens + 60,
                capacity: 10,
            })
            .await
            .unwrap();
        slot_ids.push(slot.id);
    }

    let product = db
        .products()
        .create(NewProduct {
            sku: "SHAKE-CHOC".to_string(),
            name: "Chocolate Shake".to_string(),
            price_cents: 350,
            stock_quantity: 5,
            min_stock: 1,
        })
        .await
        .unwrap();

    Seeded {
        plan_id: plan.id,
        slot_ids,
        product_id: product.id,
    }
}
