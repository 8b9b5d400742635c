//! # Sales
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  record_sale ─────────────────────────────► COMPLETED ──void_sale──►    │
//! │                                                ▲                VOID    │
//! │  hold_sale ──► OPEN ──complete_sale────────────┘                 ▲      │
//! │                  │    (reserved → deducted)                      │      │
//! │                  └──────release_sale─────────────────────────────┘      │
//! │                         (reservation returned)                          │
//! │                                                                         │
//! │  deductions:  one `sale` movement per line, shared correlation id       │
//! │  void:        one `void-reversal` per line, same correlation id         │
//! │  hold/release: reserved quantity only, no movements                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every line of a sale is planned while all of its balance keys are
//! locked. One failing line rejects the whole sale.

use std::collections::BTreeSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::coordinator::{Ledger, Provenance, RequestContext, WorkingSet};
use crate::error::EngineResult;
use crate::locks::LockKey;
use depot_core::balance::{BalanceChange, BalanceState, PlanResult};
use depot_core::validation::{
    validate_id, validate_line_count, validate_line_pricing, validate_notes,
    validate_positive_quantity,
};
use depot_core::{
    BalanceKey, LedgerError, MovementEntry, MovementType, Money, PaymentMethod, Sale, SaleLine,
    SaleStatus, StockBalance, ValidationError,
};
use depot_db::{LedgerBatch, SaleInsert, SaleTransition};

/// Reason recorded on movements produced by a sale.
const SALE_REASON: &str = "sale";

// =============================================================================
// Requests & Outcomes
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLineRequest {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Money,
    #[serde(default)]
    pub discount: Money,
}

impl SaleLineRequest {
    pub fn new(product_id: impl Into<String>, quantity: i64, unit_price: Money) -> Self {
        SaleLineRequest {
            product_id: product_id.into(),
            quantity,
            unit_price,
            discount: Money::zero(),
        }
    }

    pub fn with_discount(mut self, discount: Money) -> Self {
        self.discount = discount;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRequest {
    pub warehouse_id: String,
    pub lines: Vec<SaleLineRequest>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub notes: Option<String>,
}

impl SaleRequest {
    pub fn new(warehouse_id: impl Into<String>, lines: Vec<SaleLineRequest>) -> Self {
        SaleRequest {
            warehouse_id: warehouse_id.into(),
            lines,
            customer_name: None,
            payment_method: PaymentMethod::default(),
            notes: None,
        }
    }
}

/// A sale after an operation, with the balances it touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleOutcome {
    pub sale: Sale,
    pub lines: Vec<SaleLine>,
    /// Post-operation balance of every product on the sale.
    pub balances: Vec<StockBalance>,
    /// Movements written by this operation (empty for hold and release).
    pub movements: Vec<MovementEntry>,
}

/// How a new sale treats its lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Checkout {
    /// Deduct now.
    Immediate,
    /// Only reserve; deducted by `complete_sale`.
    Hold,
}

impl Ledger {
    // =========================================================================
    // New Sales
    // =========================================================================

    /// Records a completed sale, deducting every line from on-hand stock.
    ///
    /// ## Errors
    /// * `InvalidQuantity` - a line quantity is zero or negative
    /// * `InsufficientStock` - any line exceeds what is available; no line is applied
    /// * `NotFound` / `InvalidWarehouse` - unknown product, unknown or inactive warehouse
    /// * `Timeout`
    pub async fn record_sale(
        &self,
        ctx: &RequestContext,
        request: SaleRequest,
    ) -> EngineResult<SaleOutcome> {
        self.new_sale(ctx, request, Checkout::Immediate).await
    }

    /// Creates an open sale that reserves its lines without deducting them.
    pub async fn hold_sale(
        &self,
        ctx: &RequestContext,
        request: SaleRequest,
    ) -> EngineResult<SaleOutcome> {
        self.new_sale(ctx, request, Checkout::Hold).await
    }

    async fn new_sale(
        &self,
        ctx: &RequestContext,
        request: SaleRequest,
        checkout: Checkout,
    ) -> EngineResult<SaleOutcome> {
        let deadline = self.deadline(ctx);
        self.validate_context(ctx)?;
        validate_id("warehouse_id", &request.warehouse_id)?;
        validate_line_count(request.lines.len())?;
        let notes = validate_notes(request.notes.as_deref())?;
        let customer_name = request
            .customer_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        let now = Utc::now();
        let sale_id = Uuid::new_v4().to_string();
        let mut lines = Vec::with_capacity(request.lines.len());
        let mut subtotal = 0i64;
        let mut discount = 0i64;
        let mut total = 0i64;

        for (index, line) in request.lines.iter().enumerate() {
            validate_id("product_id", &line.product_id)?;
            validate_positive_quantity("quantity", line.quantity)?;
            let line_total = validate_line_pricing(line.unit_price, line.quantity, line.discount)?;

            subtotal = add_cents(subtotal, line_total.cents() + line.discount.cents())?;
            discount = add_cents(discount, line.discount.cents())?;
            total = add_cents(total, line_total.cents())?;

            lines.push(SaleLine {
                id: Uuid::new_v4().to_string(),
                sale_id: sale_id.clone(),
                line_no: index as i64 + 1,
                product_id: line.product_id.clone(),
                quantity: line.quantity,
                unit_price_cents: line.unit_price.cents(),
                discount_cents: line.discount.cents(),
                line_total_cents: line_total.cents(),
                movement_id: None,
            });
        }

        self.require_warehouse(&request.warehouse_id).await?;
        let products: BTreeSet<&str> = lines.iter().map(|l| l.product_id.as_str()).collect();
        for product_id in &products {
            self.require_product(product_id).await?;
        }

        let keys: Vec<BalanceKey> = products
            .iter()
            .map(|product_id| BalanceKey::new(*product_id, &request.warehouse_id))
            .collect();
        let _locks = self
            .locks
            .acquire(keys.iter().cloned().map(LockKey::from), deadline)
            .await?;

        let mut work = self.load(&keys).await?;
        let mut changes = Vec::with_capacity(lines.len());
        for line in &lines {
            let key = BalanceKey::new(&line.product_id, &request.warehouse_id);
            let qty = line.quantity;
            let change = match checkout {
                Checkout::Immediate => work.apply(&key, |s| s.plan_debit(qty))?,
                Checkout::Hold => work.apply(&key, |s| s.plan_reserve(qty))?,
            };
            changes.push((key, change));
        }

        let (status, completed_at) = match checkout {
            Checkout::Immediate => (SaleStatus::Completed, Some(now)),
            Checkout::Hold => (SaleStatus::Open, None),
        };
        let mut sale = Sale {
            id: sale_id.clone(),
            receipt_number: String::new(),
            warehouse_id: request.warehouse_id.clone(),
            status,
            subtotal_cents: subtotal,
            discount_cents: discount,
            total_cents: total,
            customer_name,
            payment_method: request.payment_method,
            notes: notes.clone(),
            actor_id: ctx.actor_id.clone(),
            correlation_id: Uuid::new_v4().to_string(),
            void_reason: None,
            created_at: now,
            completed_at,
            voided_at: None,
        };

        let mut batch = LedgerBatch::new();
        batch.balances = work.writes(now);
        if checkout == Checkout::Immediate {
            let provenance = Provenance::new(ctx, SALE_REASON.to_string(), notes)
                .correlated(&sale.correlation_id)
                .referencing(&sale.id);
            for (index, ((key, change), line)) in changes.iter().zip(&lines).enumerate() {
                batch
                    .movements
                    .push(provenance.movement(key, MovementType::Sale, change));
                batch.line_movements.push((line.id.clone(), index));
            }
        }
        batch.sale = Some(SaleInsert {
            sale: sale.clone(),
            lines: lines.clone(),
        });

        let (movements, receipt_number) = self.commit_with_receipt(batch).await?;
        sale.receipt_number = receipt_number.unwrap_or_default();
        link_movements(&mut lines, &movements);

        info!(
            sale_id = %sale.id,
            receipt = %sale.receipt_number,
            status = %sale.status,
            lines = lines.len(),
            total = %sale.total(),
            actor = %ctx.actor_id,
            "Sale recorded"
        );

        Ok(SaleOutcome {
            sale,
            lines,
            balances: work.snapshots(now),
            movements,
        })
    }

    // =========================================================================
    // Held Sales
    // =========================================================================

    /// Turns an open sale's reservations into deductions.
    ///
    /// ## Errors
    /// * `InvalidSaleStatus` - the sale is not open
    /// * `NotFound` - unknown sale
    pub async fn complete_sale(
        &self,
        ctx: &RequestContext,
        sale_id: &str,
    ) -> EngineResult<SaleOutcome> {
        let deadline = self.deadline(ctx);
        self.validate_context(ctx)?;
        validate_id("sale_id", sale_id)?;

        let (sale, mut lines, keys) = self.sale_for_update(sale_id).await?;
        let _locks = self.lock_sale(&sale, &keys, deadline).await?;

        let sale = self.reread_sale(&sale.id).await?;
        expect_status(&sale, SaleStatus::Open)?;

        let mut work = self.load(&keys).await?;
        let changes = plan_lines(&mut work, &sale, &lines, |s, qty| s.plan_fulfil(qty))?;

        let now = Utc::now();
        let provenance = Provenance::new(ctx, SALE_REASON.to_string(), sale.notes.clone())
            .correlated(&sale.correlation_id)
            .referencing(&sale.id);

        let mut batch = LedgerBatch::new();
        batch.balances = work.writes(now);
        for (index, ((key, change), line)) in changes.iter().zip(&lines).enumerate() {
            batch
                .movements
                .push(provenance.movement(key, MovementType::Sale, change));
            batch.line_movements.push((line.id.clone(), index));
        }
        batch.sale_transition = Some(SaleTransition {
            sale_id: sale.id.clone(),
            from: SaleStatus::Open,
            to: SaleStatus::Completed,
            at: now,
            void_reason: None,
        });

        let movements = self.commit(batch).await?;
        link_movements(&mut lines, &movements);

        let mut sale = sale;
        sale.status = SaleStatus::Completed;
        sale.completed_at = Some(now);

        info!(sale_id = %sale.id, receipt = %sale.receipt_number, actor = %ctx.actor_id, "Held sale completed");

        Ok(SaleOutcome {
            sale,
            lines,
            balances: work.snapshots(now),
            movements,
        })
    }

    /// Abandons an open sale and returns its reservations.
    pub async fn release_sale(
        &self,
        ctx: &RequestContext,
        sale_id: &str,
        reason: &str,
    ) -> EngineResult<SaleOutcome> {
        let deadline = self.deadline(ctx);
        self.validate_context(ctx)?;
        validate_id("sale_id", sale_id)?;
        let reason = self.checked_reason(reason)?;

        let (sale, lines, keys) = self.sale_for_update(sale_id).await?;
        let _locks = self.lock_sale(&sale, &keys, deadline).await?;

        let sale = self.reread_sale(&sale.id).await?;
        expect_status(&sale, SaleStatus::Open)?;

        let mut work = self.load(&keys).await?;
        plan_lines(&mut work, &sale, &lines, |s, qty| s.plan_release(qty))?;

        let now = Utc::now();
        let mut batch = LedgerBatch::new();
        batch.balances = work.writes(now);
        batch.sale_transition = Some(SaleTransition {
            sale_id: sale.id.clone(),
            from: SaleStatus::Open,
            to: SaleStatus::Void,
            at: now,
            void_reason: Some(reason.clone()),
        });
        self.commit(batch).await?;

        let mut sale = sale;
        sale.status = SaleStatus::Void;
        sale.voided_at = Some(now);
        sale.void_reason = Some(reason);

        info!(sale_id = %sale.id, actor = %ctx.actor_id, "Held sale released");

        Ok(SaleOutcome {
            sale,
            lines,
            balances: work.snapshots(now),
            movements: Vec::new(),
        })
    }

    // =========================================================================
    // Void
    // =========================================================================

    /// Voids a completed sale by appending one compensating movement per line.
    ///
    /// The original `sale` movements stay untouched. Irreversible.
    ///
    /// ## Errors
    /// * `AlreadyVoid` - the sale is not completed
    /// * `NotFound` - unknown sale
    pub async fn void_sale(
        &self,
        ctx: &RequestContext,
        sale_id: &str,
        void_reason: &str,
    ) -> EngineResult<SaleOutcome> {
        let deadline = self.deadline(ctx);
        self.validate_context(ctx)?;
        validate_id("sale_id", sale_id)?;
        let reason = self.checked_reason(void_reason)?;

        let (sale, lines, keys) = self.sale_for_update(sale_id).await?;
        let _locks = self.lock_sale(&sale, &keys, deadline).await?;

        let sale = self.reread_sale(&sale.id).await?;
        if sale.status != SaleStatus::Completed {
            warn!(sale_id = %sale.id, status = %sale.status, "Rejected void of non-completed sale");
            return Err(LedgerError::AlreadyVoid {
                sale_id: sale.id.clone(),
                status: sale.status.to_string(),
            }
            .into());
        }

        let mut work = self.load(&keys).await?;
        let changes = plan_lines(&mut work, &sale, &lines, |s, qty| s.plan_credit(qty))?;

        let now = Utc::now();
        let provenance = Provenance::new(ctx, reason.clone(), None)
            .correlated(&sale.correlation_id)
            .referencing(&sale.id);

        let mut batch = LedgerBatch::new();
        batch.balances = work.writes(now);
        for (key, change) in &changes {
            batch
                .movements
                .push(provenance.movement(key, MovementType::VoidReversal, change));
        }
        batch.sale_transition = Some(SaleTransition {
            sale_id: sale.id.clone(),
            from: SaleStatus::Completed,
            to: SaleStatus::Void,
            at: now,
            void_reason: Some(reason.clone()),
        });

        let movements = self.commit(batch).await?;

        let mut sale = sale;
        sale.status = SaleStatus::Void;
        sale.voided_at = Some(now);
        sale.void_reason = Some(reason);

        info!(
            sale_id = %sale.id,
            receipt = %sale.receipt_number,
            reversed = movements.len(),
            actor = %ctx.actor_id,
            "Sale voided"
        );

        Ok(SaleOutcome {
            sale,
            lines,
            balances: work.snapshots(now),
            movements,
        })
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Loads a sale with its lines and the balance keys they touch.
    ///
    /// Lines never change after insert, so reading them before locking is safe.
    async fn sale_for_update(
        &self,
        sale_id: &str,
    ) -> EngineResult<(Sale, Vec<SaleLine>, Vec<BalanceKey>)> {
        let sale = self.reread_sale(sale_id).await?;
        let lines = self.db.sales().get_lines(sale_id).await?;

        let keys: BTreeSet<BalanceKey> = lines
            .iter()
            .map(|line| BalanceKey::new(&line.product_id, &sale.warehouse_id))
            .collect();

        Ok((sale, lines, keys.into_iter().collect()))
    }

    async fn lock_sale(
        &self,
        sale: &Sale,
        keys: &[BalanceKey],
        deadline: tokio::time::Instant,
    ) -> EngineResult<crate::locks::LockSet> {
        let lock_keys = keys
            .iter()
            .cloned()
            .map(LockKey::from)
            .chain(std::iter::once(LockKey::Sale(sale.id.clone())));
        Ok(self.locks.acquire(lock_keys, deadline).await?)
    }

    async fn reread_sale(&self, sale_id: &str) -> EngineResult<Sale> {
        self.db
            .sales()
            .get_by_id(sale_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Sale", sale_id).into())
    }
}

/// Applies `plan` to every line of an existing sale, in line order.
fn plan_lines(
    work: &mut WorkingSet,
    sale: &Sale,
    lines: &[SaleLine],
    plan: impl Fn(&BalanceState, i64) -> PlanResult,
) -> EngineResult<Vec<(BalanceKey, BalanceChange)>> {
    let mut changes = Vec::with_capacity(lines.len());
    for line in lines {
        let key = BalanceKey::new(&line.product_id, &sale.warehouse_id);
        let change = work.apply(&key, |s| plan(s, line.quantity))?;
        changes.push((key, change));
    }
    Ok(changes)
}

fn expect_status(sale: &Sale, expected: SaleStatus) -> Result<(), LedgerError> {
    if sale.status == expected {
        return Ok(());
    }

    warn!(sale_id = %sale.id, status = %sale.status, expected = %expected, "Sale in wrong state");
    Err(LedgerError::InvalidSaleStatus {
        sale_id: sale.id.clone(),
        status: sale.status.to_string(),
        expected: expected.to_string(),
    })
}

/// Lines and movements are in the same order.
fn link_movements(lines: &mut [SaleLine], movements: &[MovementEntry]) {
    for (line, movement) in lines.iter_mut().zip(movements) {
        line.movement_id = Some(movement.id);
    }
}

fn add_cents(total: i64, cents: i64) -> Result<i64, ValidationError> {
    total.checked_add(cents).ok_or_else(|| ValidationError::OutOfRange {
        field: "sale total".to_string(),
        min: 0,
        max: i64::MAX,
    })
}
