//! Read side: availability, low-stock reports, audit trails, reconciliation.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::{fixture, line};
use depot_core::stock::AlertSeverity;
use depot_core::{
    ErrorKind, Product, ProductThresholds, PurchaseOrder, PurchaseOrderLine, Warehouse,
};
use depot_engine::{
    AdjustRequest, Catalog, EngineConfig, EngineResult, Ledger, SaleRequest, SqliteCatalog,
};

#[tokio::test]
async fn test_availability_without_a_balance_row() {
    let f = fixture().await;

    let availability = f.ledger.available_quantity(&f.p1, &f.w1).await.unwrap();
    assert_eq!(availability.on_hand, 0);
    assert_eq!(availability.reserved, 0);
    assert_eq!(availability.available, 0);
    assert!(!availability.can_sell(1));
}

#[tokio::test]
async fn test_low_stock_report_is_most_urgent_first() {
    let f = fixture().await;
    f.stock(&f.p1, &f.w1, 5).await; // low
    f.stock(&f.p2, &f.w1, 1).await; // critical
    f.stock(&f.p3, &f.w1, 15).await; // fine

    let alerts = f.ledger.low_stock_report(&f.w1).await.unwrap();

    assert_eq!(alerts.len(), 2);
    assert_eq!(alerts[0].product_id, f.p2);
    assert_eq!(alerts[0].severity, AlertSeverity::Critical);
    assert_eq!(alerts[0].suggested_order_quantity, 19);
    assert_eq!(alerts[1].product_id, f.p1);
    assert_eq!(alerts[1].severity, AlertSeverity::Low);

    assert!(f.ledger.low_stock_report(&f.w2).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_low_stock_for_unknown_product_is_not_found() {
    let f = fixture().await;

    let err = f.ledger.evaluate_low_stock("ghost", &f.w1).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_reconcile_detects_a_tampered_balance() {
    let f = fixture().await;
    f.stock(&f.p1, &f.w1, 10).await;
    f.stock(&f.p2, &f.w2, 3).await;
    assert!(f.ledger.reconcile().await.unwrap().is_clean());

    sqlx::query("UPDATE stock_balances SET quantity = 12 WHERE product_id = ?1 AND warehouse_id = ?2")
        .bind(&f.p1)
        .bind(&f.w1)
        .execute(f.ledger.database().pool())
        .await
        .unwrap();

    let report = f.ledger.reconcile().await.unwrap();
    assert_eq!(report.discrepancies.len(), 1);
    let drift = &report.discrepancies[0];
    assert_eq!(drift.product_id, f.p1);
    assert_eq!(drift.stored_quantity, 12);
    assert_eq!(drift.log_quantity, 10);
    assert_eq!(drift.difference(), 2);

    assert!(f.ledger.reconcile_key(&f.p2, &f.w2).await.unwrap().is_none());
    assert_eq!(
        f.ledger.reconcile_key(&f.p1, &f.w1).await.unwrap().map(|d| d.difference()),
        Some(2)
    );

    let chain = f.ledger.verify_chain(&f.p1, &f.w1).await.unwrap();
    assert!(chain.first_break.is_none());
    assert!(!chain.is_consistent());
}

#[tokio::test]
async fn test_audit_queries_by_reference_and_warehouse() {
    let f = fixture().await;
    f.stock(&f.p1, &f.w1, 10).await;
    f.stock(&f.p2, &f.w1, 10).await;

    let sale = f
        .ledger
        .record_sale(&f.ctx, SaleRequest::new(&f.w1, vec![line(&f.p1, 2), line(&f.p2, 1)]))
        .await
        .unwrap();

    let by_reference = f.ledger.movements_by_reference(&sale.sale.id).await.unwrap();
    assert_eq!(by_reference.len(), 2);

    let recent = f.ledger.recent_movements(&f.w1, 2).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert!(recent[0].id > recent[1].id);

    let balances = f.ledger.warehouse_balances(&f.w1).await.unwrap();
    assert_eq!(balances.len(), 2);
    assert_eq!(balances.iter().map(|b| b.quantity).sum::<i64>(), 17);
}

/// Catalog that serves its own thresholds and delegates everything else.
struct FixedThresholds {
    inner: SqliteCatalog,
    thresholds: ProductThresholds,
}

#[async_trait]
impl Catalog for FixedThresholds {
    async fn product(&self, product_id: &str) -> EngineResult<Option<Product>> {
        self.inner.product(product_id).await
    }

    async fn warehouse(&self, warehouse_id: &str) -> EngineResult<Option<Warehouse>> {
        self.inner.warehouse(warehouse_id).await
    }

    async fn thresholds(&self, product_id: &str) -> EngineResult<Option<ProductThresholds>> {
        Ok(self.inner.product(product_id).await?.map(|_| self.thresholds))
    }

    async fn order(&self, order_id: &str) -> EngineResult<Option<PurchaseOrder>> {
        self.inner.order(order_id).await
    }

    async fn order_line(&self, line_id: &str) -> EngineResult<Option<PurchaseOrderLine>> {
        self.inner.order_line(line_id).await
    }

    async fn order_lines(&self, order_id: &str) -> EngineResult<Vec<PurchaseOrderLine>> {
        self.inner.order_lines(order_id).await
    }
}

#[tokio::test]
async fn test_thresholds_come_from_the_catalog() {
    let f = fixture().await;
    let db = f.ledger.database().clone();
    let catalog = Arc::new(FixedThresholds {
        inner: SqliteCatalog::new(db.clone()),
        thresholds: ProductThresholds::new(50, 10, 100),
    });
    let ledger = Ledger::with_catalog(db, catalog, EngineConfig::in_memory());

    ledger
        .adjust(&f.ctx, AdjustRequest::new(&f.p1, &f.w1, 30, "opening stock"))
        .await
        .unwrap();

    let status = ledger.evaluate_low_stock(&f.p1, &f.w1).await.unwrap();
    assert!(status.is_low_stock);
    assert!(!status.is_critical);
    assert_eq!(status.suggested_order_quantity, 70);

    // Same balance against the product's own thresholds.
    let status = f.ledger.evaluate_low_stock(&f.p1, &f.w1).await.unwrap();
    assert!(!status.is_low_stock);
    assert_eq!(status.suggested_order_quantity, 0);
}
