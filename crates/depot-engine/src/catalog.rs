//! # Catalog Seam
//!
//! Master data the ledger reads but never owns: products (and their stock
//! thresholds), warehouses, and purchase orders.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Ledger ──► Arc<dyn Catalog> ──► SqliteCatalog (same SQLite file)      │
//! │                              └─► any other store (tests, services)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;

use crate::error::EngineResult;
use depot_core::{Product, ProductThresholds, PurchaseOrder, PurchaseOrderLine, Warehouse};
use depot_db::Database;

/// Read-only access to master data.
///
/// Lookups return `Ok(None)` for unknown ids; the caller decides whether
/// that is a `NotFound`.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn product(&self, product_id: &str) -> EngineResult<Option<Product>>;

    async fn warehouse(&self, warehouse_id: &str) -> EngineResult<Option<Warehouse>>;

    /// Reorder point and stock levels of a product.
    async fn thresholds(&self, product_id: &str) -> EngineResult<Option<ProductThresholds>> {
        Ok(self.product(product_id).await?.map(|p| p.thresholds()))
    }

    async fn order(&self, order_id: &str) -> EngineResult<Option<PurchaseOrder>>;

    async fn order_line(&self, line_id: &str) -> EngineResult<Option<PurchaseOrderLine>>;

    async fn order_lines(&self, order_id: &str) -> EngineResult<Vec<PurchaseOrderLine>>;
}

/// [`Catalog`] over the master-data tables of the ledger database.
#[derive(Debug, Clone)]
pub struct SqliteCatalog {
    db: Database,
}

impl SqliteCatalog {
    pub fn new(db: Database) -> Self {
        SqliteCatalog { db }
    }
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn product(&self, product_id: &str) -> EngineResult<Option<Product>> {
        Ok(self.db.catalog().get_product(product_id).await?)
    }

    async fn warehouse(&self, warehouse_id: &str) -> EngineResult<Option<Warehouse>> {
        Ok(self.db.catalog().get_warehouse(warehouse_id).await?)
    }

    async fn order(&self, order_id: &str) -> EngineResult<Option<PurchaseOrder>> {
        Ok(self.db.purchase_orders().get_order(order_id).await?)
    }

    async fn order_line(&self, line_id: &str) -> EngineResult<Option<PurchaseOrderLine>> {
        Ok(self.db.purchase_orders().get_line(line_id).await?)
    }

    async fn order_lines(&self, order_id: &str) -> EngineResult<Vec<PurchaseOrderLine>> {
        Ok(self.db.purchase_orders().get_lines(order_id).await?)
    }
}
