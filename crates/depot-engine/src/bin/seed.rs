//! # Seed Data Generator
//!
//! Populates a ledger database with demo master data and opening stock.
//!
//! ## Usage
//! ```bash
//! # Seed the configured database
//! cargo run -p depot-engine --bin seed
//!
//! # Specify database path
//! cargo run -p depot-engine --bin seed -- --db ./data/depot_dev.db
//!
//! # Use an explicit config file
//! cargo run -p depot-engine --bin seed -- --config ./depot.toml
//! ```
//!
//! ## Generated Data
//! - Two warehouses: `MAIN` and `NORTH`
//! - Products across a few categories, each with reorder thresholds
//! - Opening stock at `MAIN` via `adjust`, part of it transferred to `NORTH`
//! - One open purchase order covering the lowest-stocked products

use std::env;
use std::path::PathBuf;

use depot_core::ProductThresholds;
use depot_db::NewProduct;
use depot_engine::{AdjustRequest, EngineConfig, Ledger, RequestContext, TransferRequest};

/// (sku prefix, name, unit, price cents)
const PRODUCTS: &[(&str, &str, &str, i64)] = &[
    ("BEV", "Sparkling Water 500ml", "bottle", 129),
    ("BEV", "Orange Juice 1L", "carton", 349),
    ("BEV", "Cold Brew Coffee", "can", 299),
    ("SNK", "Sea Salt Crisps", "bag", 199),
    ("SNK", "Dark Chocolate Bar", "each", 249),
    ("SNK", "Trail Mix 250g", "bag", 459),
    ("DRY", "Basmati Rice 5kg", "sack", 1299),
    ("DRY", "Penne Pasta 500g", "pack", 189),
    ("DRY", "Chopped Tomatoes", "tin", 99),
    ("HSE", "Dish Soap 750ml", "bottle", 279),
    ("HSE", "Paper Towels 6pk", "pack", 699),
    ("HSE", "AA Batteries 4pk", "pack", 549),
];

const ACTOR: &str = "seed";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    depot_engine::init_tracing();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut db_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Depot Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>      Database file path (overrides config)");
                println!("  -c, --config <PATH>  Config file (default: platform config dir)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = EngineConfig::load(config_path)?;
    if let Some(path) = db_path {
        config.database.path = path;
    }

    println!("🌱 Depot Seed Data Generator");
    println!("============================");
    println!("Database: {}", config.database.path.display());
    println!();

    if let Some(parent) = config.database.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let ledger = Ledger::open(config).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let db = ledger.database();
    let existing = db.catalog().count_products().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let main_wh = db.catalog().insert_warehouse("MAIN", "Main Distribution Centre").await?;
    let north_wh = db.catalog().insert_warehouse("NORTH", "North Store").await?;
    println!("✓ Created warehouses {} and {}", main_wh.code, north_wh.code);

    let ctx = RequestContext::new(ACTOR);
    let start = std::time::Instant::now();
    let mut created = Vec::with_capacity(PRODUCTS.len());

    for (index, (prefix, name, unit, price_cents)) in PRODUCTS.iter().enumerate() {
        let seed = index as i64;
        let product = db
            .catalog()
            .insert_product(&NewProduct {
                sku: format!("{}-{:03}", prefix, index + 1),
                name: name.to_string(),
                unit_of_measure: unit.to_string(),
                thresholds: ProductThresholds::new(10 + seed % 5, 3, 80),
                unit_cost_cents: price_cents * (60 + seed % 20) / 100,
                unit_price_cents: *price_cents,
            })
            .await?;

        // Opening stock 4..=64, so some products start below their reorder point
        let opening = 4 + (seed * 37) % 61;
        let mut opening_request = AdjustRequest::new(&product.id, &main_wh.id, opening, "opening stock");
        opening_request.location = Some(format!("{}-{:02}", prefix, index % 12 + 1));
        ledger.adjust(&ctx, opening_request).await?;

        if opening > 20 {
            ledger
                .transfer(
                    &ctx,
                    TransferRequest::new(&product.id, &main_wh.id, &north_wh.id, opening / 4, "store replenishment"),
                )
                .await?;
        }

        created.push((product, opening));
    }

    println!("✓ Created {} products with opening stock in {:?}", created.len(), start.elapsed());

    // Reorder whatever is low at MAIN
    let alerts = ledger.low_stock_report(&main_wh.id).await?;
    let order_lines: Vec<(String, i64, i64)> = alerts
        .iter()
        .filter_map(|alert| {
            created
                .iter()
                .find(|(p, _)| p.id == alert.product_id)
                .map(|(p, _)| (p.id.clone(), alert.suggested_order_quantity.max(1), p.unit_cost_cents))
        })
        .collect();

    if order_lines.is_empty() {
        println!("✓ No low-stock products, skipping purchase order");
    } else {
        let (order, lines) = db
            .purchase_orders()
            .insert_order("PO-0001", "Acme Wholesale", &order_lines)
            .await?;
        println!("✓ Created purchase order {} with {} lines", order.po_number, lines.len());
    }

    let report = ledger.reconcile().await?;
    println!();
    if report.is_clean() {
        println!("✓ Balances reconcile with the movement log");
    } else {
        println!("⚠ {} balances disagree with the movement log", report.discrepancies.len());
    }

    println!("✓ Seed complete!");
    Ok(())
}
