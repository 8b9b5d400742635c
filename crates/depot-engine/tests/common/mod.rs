//! Shared fixture: a ledger with two warehouses and three products.
#![allow(dead_code)]

use depot_core::{Money, ProductThresholds};
use depot_db::{Database, DbConfig, NewProduct};
use depot_engine::{AdjustRequest, EngineConfig, Ledger, RequestContext, SaleLineRequest};

pub struct Fixture {
    pub ledger: Ledger,
    pub w1: String,
    pub w2: String,
    /// Reorder point 5, min stock 2, max stock 20.
    pub p1: String,
    pub p2: String,
    pub p3: String,
    pub ctx: RequestContext,
}

pub async fn fixture() -> Fixture {
    fixture_on(DbConfig::in_memory()).await
}

/// The same master data on any database, e.g. a file on disk.
pub async fn fixture_on(config: DbConfig) -> Fixture {
    let db = Database::new(config).await.unwrap();
    let catalog = db.catalog();

    let w1 = catalog.insert_warehouse("W1", "Main").await.unwrap();
    let w2 = catalog.insert_warehouse("W2", "Annex").await.unwrap();

    let mut ids = Vec::new();
    for sku in ["P1", "P2", "P3"] {
        let product = catalog
            .insert_product(&NewProduct {
                sku: sku.to_string(),
                name: format!("Product {sku}"),
                unit_of_measure: "each".to_string(),
                thresholds: ProductThresholds::new(5, 2, 20),
                unit_cost_cents: 300,
                unit_price_cents: 500,
            })
            .await
            .unwrap();
        ids.push(product.id);
    }

    Fixture {
        ledger: Ledger::new(db, EngineConfig::in_memory()),
        w1: w1.id,
        w2: w2.id,
        p1: ids[0].clone(),
        p2: ids[1].clone(),
        p3: ids[2].clone(),
        ctx: RequestContext::new("tester"),
    }
}

impl Fixture {
    /// Adds opening stock through the ledger.
    pub async fn stock(&self, product_id: &str, warehouse_id: &str, quantity: i64) {
        self.ledger
            .adjust(
                &self.ctx,
                AdjustRequest::new(product_id, warehouse_id, quantity, "opening stock"),
            )
            .await
            .unwrap();
    }

    /// On-hand quantity (zero when the key never moved).
    pub async fn quantity(&self, product_id: &str, warehouse_id: &str) -> i64 {
        self.ledger
            .balance(product_id, warehouse_id)
            .await
            .unwrap()
            .map_or(0, |b| b.quantity)
    }

    pub async fn reserved(&self, product_id: &str, warehouse_id: &str) -> i64 {
        self.ledger
            .balance(product_id, warehouse_id)
            .await
            .unwrap()
            .map_or(0, |b| b.reserved_quantity)
    }

    /// Σ deltas of a key's movement log.
    pub async fn log_sum(&self, product_id: &str, warehouse_id: &str) -> i64 {
        self.ledger
            .history(product_id, warehouse_id)
            .await
            .unwrap()
            .iter()
            .map(|m| m.quantity_delta)
            .sum()
    }
}

pub fn line(product_id: &str, quantity: i64) -> SaleLineRequest {
    SaleLineRequest::new(product_id, quantity, Money::from_cents(500))
}
