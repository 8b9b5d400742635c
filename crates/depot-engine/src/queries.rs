//! # Read Side
//!
//! Lock-free queries. Results were true at some instant during the call;
//! a concurrent writer may already have moved on.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  available_quantity   on hand − reserved (advisory for carts)          │
//! │  evaluate_low_stock   thresholds from the catalog, computed on read    │
//! │  low_stock_report     every low/critical balance of a warehouse        │
//! │  history / by_*       audit queries over the movement log              │
//! │  verify_chain         before == previous after, per key                │
//! │  reconcile            balance store vs Σ deltas                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::coordinator::Ledger;
use crate::error::EngineResult;
use depot_core::balance::{self, ChainBreak};
use depot_core::stock::{
    self, available_quantity, sort_by_urgency, Availability, LowStockAlert, LowStockStatus,
};
use depot_core::validation::validate_id;
use depot_core::{BalanceKey, LedgerError, MovementEntry, Sale, SaleLine, SaleStatus, StockBalance};
use depot_db::BalanceDrift;

/// Result of walking one key's movement chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainVerification {
    pub key: BalanceKey,
    pub entries: usize,
    /// Final `balance_after` of the chain, if it is unbroken.
    pub chain_quantity: Option<i64>,
    /// Quantity in the balance store (zero when no row exists).
    pub stored_quantity: i64,
    pub first_break: Option<ChainBreak>,
}

impl ChainVerification {
    /// Unbroken, and ends where the balance store says.
    pub fn is_consistent(&self) -> bool {
        self.first_break.is_none() && self.chain_quantity == Some(self.stored_quantity)
    }
}

/// Balance store vs movement log for every key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub discrepancies: Vec<BalanceDrift>,
}

impl ReconciliationReport {
    pub fn is_clean(&self) -> bool {
        self.discrepancies.is_empty()
    }
}

/// A sale together with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleDetail {
    pub sale: Sale,
    pub lines: Vec<SaleLine>,
}

impl Ledger {
    // =========================================================================
    // Balances
    // =========================================================================

    /// Current balance row, if the key has ever moved.
    pub async fn balance(&self, product_id: &str, warehouse_id: &str) -> EngineResult<Option<StockBalance>> {
        let key = BalanceKey::new(product_id, warehouse_id);
        Ok(self.db.balances().get(&key).await?)
    }

    /// Every balance row of a warehouse.
    pub async fn warehouse_balances(&self, warehouse_id: &str) -> EngineResult<Vec<StockBalance>> {
        Ok(self.db.balances().list_by_warehouse(warehouse_id).await?)
    }

    /// Total on-hand quantity of a product across all warehouses.
    pub async fn total_on_hand(&self, product_id: &str) -> EngineResult<i64> {
        Ok(self.db.balances().total_for_product(product_id).await?)
    }

    /// How much of a product can be sold at a warehouse right now.
    ///
    /// Advisory: `record_sale` re-checks under the lock.
    pub async fn available_quantity(
        &self,
        product_id: &str,
        warehouse_id: &str,
    ) -> EngineResult<Availability> {
        validate_id("product_id", product_id)?;
        validate_id("warehouse_id", warehouse_id)?;

        let key = BalanceKey::new(product_id, warehouse_id);
        let availability = match self.db.balances().get(&key).await? {
            Some(balance) => available_quantity(&balance),
            None => Availability::none(&key),
        };

        debug!(key = %key, available = availability.available, "Availability read");
        Ok(availability)
    }

    // =========================================================================
    // Low Stock
    // =========================================================================

    /// Compares a balance with its product's thresholds.
    pub async fn evaluate_low_stock(
        &self,
        product_id: &str,
        warehouse_id: &str,
    ) -> EngineResult<LowStockStatus> {
        validate_id("product_id", product_id)?;
        validate_id("warehouse_id", warehouse_id)?;

        let thresholds = self
            .catalog
            .thresholds(product_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Product", product_id))?;

        let key = BalanceKey::new(product_id, warehouse_id);
        let quantity = self
            .db
            .balances()
            .get(&key)
            .await?
            .map_or(0, |b| b.quantity);

        Ok(stock::evaluate_low_stock(quantity, &thresholds))
    }

    /// Low and critical balances of a warehouse, most urgent first.
    pub async fn low_stock_report(&self, warehouse_id: &str) -> EngineResult<Vec<LowStockAlert>> {
        validate_id("warehouse_id", warehouse_id)?;

        let balances = self.db.balances().list_by_warehouse(warehouse_id).await?;
        let mut alerts = Vec::new();

        for balance in &balances {
            let Some(thresholds) = self.catalog.thresholds(&balance.product_id).await? else {
                debug!(product_id = %balance.product_id, "No thresholds for product, skipping");
                continue;
            };
            if let Some(alert) = LowStockAlert::from_balance(balance, &thresholds) {
                alerts.push(alert);
            }
        }

        sort_by_urgency(&mut alerts);
        debug!(warehouse_id, checked = balances.len(), alerts = alerts.len(), "Low-stock report built");
        Ok(alerts)
    }

    // =========================================================================
    // Audit
    // =========================================================================

    /// Every movement of a key, in log order.
    pub async fn history(&self, product_id: &str, warehouse_id: &str) -> EngineResult<Vec<MovementEntry>> {
        let key = BalanceKey::new(product_id, warehouse_id);
        Ok(self.db.movements().history(&key).await?)
    }

    /// Both halves of a transfer, or every line movement of a sale and its void.
    pub async fn movements_by_correlation(&self, correlation_id: &str) -> EngineResult<Vec<MovementEntry>> {
        Ok(self.db.movements().by_correlation(correlation_id).await?)
    }

    /// Movements of a sale (by sale id) or an order line (by line id).
    pub async fn movements_by_reference(&self, reference_id: &str) -> EngineResult<Vec<MovementEntry>> {
        Ok(self.db.movements().by_reference(reference_id).await?)
    }

    /// Latest movements at a warehouse, newest first.
    pub async fn recent_movements(&self, warehouse_id: &str, limit: u32) -> EngineResult<Vec<MovementEntry>> {
        Ok(self.db.movements().recent_for_warehouse(warehouse_id, limit).await?)
    }

    pub async fn sale(&self, sale_id: &str) -> EngineResult<SaleDetail> {
        let sale = self
            .db
            .sales()
            .get_by_id(sale_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Sale", sale_id))?;
        let lines = self.db.sales().get_lines(sale_id).await?;
        Ok(SaleDetail { sale, lines })
    }

    /// Held sales of a warehouse, i.e. everything currently reserving stock.
    pub async fn open_sales(&self, warehouse_id: &str) -> EngineResult<Vec<Sale>> {
        Ok(self.db.sales().list_by_status(warehouse_id, SaleStatus::Open).await?)
    }

    /// Walks a key's history and compares its end with the balance store.
    pub async fn verify_chain(&self, product_id: &str, warehouse_id: &str) -> EngineResult<ChainVerification> {
        let key = BalanceKey::new(product_id, warehouse_id);
        let entries = self.db.movements().history(&key).await?;
        let stored_quantity = self.db.balances().get(&key).await?.map_or(0, |b| b.quantity);

        let (chain_quantity, first_break) = match balance::verify_chain(&entries) {
            Ok(quantity) => (Some(quantity), None),
            Err(chain_break) => {
                warn!(key = %key, movement_id = chain_break.movement_id, "Movement chain broken");
                (None, Some(chain_break))
            }
        };

        Ok(ChainVerification {
            key,
            entries: entries.len(),
            chain_quantity,
            stored_quantity,
            first_break,
        })
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    /// Every balance whose quantity differs from the sum of its deltas.
    pub async fn reconcile(&self) -> EngineResult<ReconciliationReport> {
        let discrepancies = self.db.movements().drift().await?;
        for drift in &discrepancies {
            warn!(
                key = %drift.key(),
                stored = drift.stored_quantity,
                log = drift.log_quantity,
                "Balance disagrees with movement log"
            );
        }
        Ok(ReconciliationReport { discrepancies })
    }

    /// One key's stored quantity vs its log; `None` when they agree.
    pub async fn reconcile_key(&self, product_id: &str, warehouse_id: &str) -> EngineResult<Option<BalanceDrift>> {
        let key = BalanceKey::new(product_id, warehouse_id);
        let stored_quantity = self.db.balances().get(&key).await?.map_or(0, |b| b.quantity);
        let log_quantity = self.db.movements().delta_sum(&key).await?;

        if stored_quantity == log_quantity {
            return Ok(None);
        }

        Ok(Some(BalanceDrift {
            product_id: key.product_id,
            warehouse_id: key.warehouse_id,
            stored_quantity,
            log_quantity,
        }))
    }
}
