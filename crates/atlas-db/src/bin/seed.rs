//! # Seed Data Generator
//!
//! Populates the database with a demo gym setup for development.
//!
//! ## Usage
//! ```bash
//! # Default database path (./data/atlas.db)
//! cargo run -p atlas-db --bin seed
//!
//! # Specify database path
//! cargo run -p atlas-db --bin seed -- --db ./data/atlas.db
//! ```
//!
//! ## Generated Data
//! - Three plans: Full Access, Mornings Only, Weekend Warrior
//! - A weekly slot grid: five time blocks per day, Monday-Sunday
//! - A small retail catalog: shakes, bars, gear

use std::env;

use atlas_core::Weekday;
use atlas_db::{Database, DbConfig, NewPlan, NewProduct, NewSlot};

const DAILY_BLOCKS: &[(i64, i64)] = &[
    (390, 450),   // 06:30 - 07:30
    (450, 510),   // 07:30 - 08:30
    (1020, 1080), // 17:00 - 18:00
    (1080, 1140), // 18:00 - 19:00
    (1140, 1200), // 19:00 - 20:00
];

const PRODUCTS: &[(&str, &str, i64, i64, i64)] = &[
    ("SHAKE-CHOC", "Chocolate Protein Shake", 350, 40, 10),
    ("SHAKE-VAN", "Vanilla Protein Shake", 350, 40, 10),
    ("BAR-PEANUT", "Peanut Protein Bar", 250, 60, 15),
    ("BAR-CHOC", "Chocolate Protein Bar", 250, 60, 15),
    ("WATER-500", "Water Bottle 500ml", 150, 100, 20),
    ("TOWEL-GYM", "Gym Towel", 1200, 25, 5),
    ("GLOVES-M", "Training Gloves M", 2500, 15, 3),
    ("SHAKER-700", "Shaker Bottle 700ml", 900, 30, 5),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let db_path = args
        .iter()
        .position(|a| a == "--db")
        .and_then(|i| args.get(i + 1))
        .cloned()
        .unwrap_or_else(|| "./data/atlas.db".to_string());

    if let Some(parent) = std::path::Path::new(&db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %db_path, "Seeding database");
    let db = Database::new(DbConfig::new(&db_path)).await?;

    // Plans ------------------------------------------------------------------
    let plans = db.plans();
    plans
        .create(NewPlan {
            name: "Full Access".to_string(),
            price_cents: 7_500,
            allowed_days: Weekday::ALL.to_vec(),
            max_slots_per_day: 2,
            max_reservations_per_week: 7,
            total_capacity: 200,
        })
        .await?;
    plans
        .create(NewPlan {
            name: "Mornings Only".to_string(),
            price_cents: 4_500,
            allowed_days: vec![
                Weekday::Monday,
                Weekday::Tuesday,
                Weekday::Wednesday,
                Weekday::Thursday,
                Weekday::Friday,
            ],
            max_slots_per_day: 1,
            max_reservations_per_week: 5,
            total_capacity: 80,
        })
        .await?;
    plans
        .create(NewPlan {
            name: "Weekend Warrior".to_string(),
            price_cents: 3_000,
            allowed_days: vec![Weekday::Saturday, Weekday::Sunday],
            max_slots_per_day: 2,
            max_reservations_per_week: 4,
            total_capacity: 60,
        })
        .await?;
    tracing::info!("Seeded 3 plans");

    // Weekly slot grid -------------------------------------------------------
    let slots = db.slots();
    let mut slot_count = 0;
    for weekday in Weekday::ALL {
        for &(opens, closes) in DAILY_BLOCKS {
            slots
                .create(NewSlot {
                    weekday,
                    opens_at_min: opens,
                    closes_at_min: closes,
                    capacity: 12,
                })
                .await?;
            slot_count += 1;
        }
    }
    tracing::info!(count = slot_count, "Seeded schedule slots");

    // Retail catalog ---------------------------------------------------------
    let products = db.products();
    for &(sku, name, price_cents, stock, min_stock) in PRODUCTS {
        products
            .create(NewProduct {
                sku: sku.to_string(),
                name: name.to_string(),
                price_cents,
                stock_quantity: stock,
                min_stock,
            })
            .await?;
    }
    tracing::info!(count = PRODUCTS.len(), "Seeded products");

    db.close().await;
    tracing::info!("Seed complete");
    Ok(())
}
