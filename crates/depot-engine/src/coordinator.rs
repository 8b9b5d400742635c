//! # Transaction Coordinator
//!
//! [`Ledger`] is the only way to change stock. Every write follows the same
//! shape:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Write Path                                           │
//! │                                                                         │
//! │  1. validate request          no locks, no database                    │
//! │  2. check master data         unknown → NotFound, inactive → Invalid   │
//! │  3. lock keys (sorted)        deadline → Timeout, nothing changed      │
//! │  4. read current balances     under the locks                          │
//! │  5. plan                      depot_core::balance rules                │
//! │  6. commit LedgerBatch        one SQLite transaction                   │
//! │  7. release locks             LockSet dropped                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Sales live in [`crate::sales`], receiving in [`crate::receiving`] and the
//! read side in [`crate::queries`]; all of them are `impl Ledger` blocks.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog::{Catalog, SqliteCatalog};
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::locks::{LockKey, LockManager};
use depot_core::balance::{BalanceChange, BalanceState, PlanResult};
use depot_core::validation::{
    validate_delta, validate_id, validate_location, validate_notes, validate_positive_quantity,
    validate_reason,
};
use depot_core::{
    BalanceKey, LedgerError, LedgerResult, MovementEntry, MovementType, NewMovement, Product,
    StockBalance, Warehouse,
};
use depot_db::{BalanceWrite, Database, LedgerBatch};

// =============================================================================
// Request Context
// =============================================================================

/// Who is calling, and how long they are willing to wait for locks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub actor_id: String,
    /// Overrides `[locks] acquire_timeout_ms` for this call.
    pub timeout: Option<Duration>,
}

impl RequestContext {
    pub fn new(actor_id: impl Into<String>) -> Self {
        RequestContext {
            actor_id: actor_id.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

// =============================================================================
// Requests & Outcomes
// =============================================================================

/// Signed stock correction at one warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustRequest {
    pub product_id: String,
    pub warehouse_id: String,
    /// Positive adds stock, negative removes it. Never zero.
    pub quantity_delta: i64,
    pub reason: String,
    #[serde(default)]
    pub notes: Option<String>,
    /// Also relabels the bin; blank clears it.
    #[serde(default)]
    pub location: Option<String>,
}

impl AdjustRequest {
    pub fn new(
        product_id: impl Into<String>,
        warehouse_id: impl Into<String>,
        quantity_delta: i64,
        reason: impl Into<String>,
    ) -> Self {
        AdjustRequest {
            product_id: product_id.into(),
            warehouse_id: warehouse_id.into(),
            quantity_delta,
            reason: reason.into(),
            notes: None,
            location: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustOutcome {
    pub balance: StockBalance,
    pub movement: MovementEntry,
}

/// Moves stock of one product between two warehouses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub product_id: String,
    pub from_warehouse_id: String,
    pub to_warehouse_id: String,
    pub quantity: i64,
    pub reason: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl TransferRequest {
    pub fn new(
        product_id: impl Into<String>,
        from_warehouse_id: impl Into<String>,
        to_warehouse_id: impl Into<String>,
        quantity: i64,
        reason: impl Into<String>,
    ) -> Self {
        TransferRequest {
            product_id: product_id.into(),
            from_warehouse_id: from_warehouse_id.into(),
            to_warehouse_id: to_warehouse_id.into(),
            quantity,
            reason: reason.into(),
            notes: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOutcome {
    /// Shared by both movements.
    pub correlation_id: String,
    pub source: StockBalance,
    pub destination: StockBalance,
    /// `[transfer-out, transfer-in]`.
    pub movements: Vec<MovementEntry>,
}

// =============================================================================
// Ledger
// =============================================================================

/// The Transaction Coordinator.
///
/// Cheap to clone; clones share the pool, the catalog and the lock table,
/// so every clone serializes against every other.
#[derive(Clone)]
pub struct Ledger {
    pub(crate) db: Database,
    pub(crate) catalog: Arc<dyn Catalog>,
    pub(crate) locks: Arc<LockManager>,
    pub(crate) config: Arc<EngineConfig>,
}

impl Ledger {
    /// A ledger reading master data from the same database.
    pub fn new(db: Database, config: EngineConfig) -> Self {
        let catalog = Arc::new(SqliteCatalog::new(db.clone()));
        Self::with_catalog(db, catalog, config)
    }

    pub fn with_catalog(db: Database, catalog: Arc<dyn Catalog>, config: EngineConfig) -> Self {
        Ledger {
            db,
            catalog,
            locks: Arc::new(LockManager::new()),
            config: Arc::new(config),
        }
    }

    /// Opens (and migrates) the configured database.
    pub async fn open(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let db = Database::new(config.db_config()).await?;
        Ok(Self::new(db, config))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.locks
    }

    // =========================================================================
    // Adjust
    // =========================================================================

    /// Applies a signed correction to one balance.
    ///
    /// ## Errors
    /// * `InvalidQuantity` - delta is zero
    /// * `InsufficientStock` - removal exceeds available (unreserved) stock
    /// * `NotFound` / `InvalidWarehouse` - unknown product, unknown or inactive warehouse
    /// * `Timeout` - the balance stayed locked past the deadline
    pub async fn adjust(
        &self,
        ctx: &RequestContext,
        request: AdjustRequest,
    ) -> EngineResult<AdjustOutcome> {
        let deadline = self.deadline(ctx);
        self.validate_context(ctx)?;
        validate_id("product_id", &request.product_id)?;
        validate_id("warehouse_id", &request.warehouse_id)?;
        validate_delta(request.quantity_delta)?;
        let reason = self.checked_reason(&request.reason)?;
        let notes = validate_notes(request.notes.as_deref())?;
        let location = request
            .location
            .as_deref()
            .map(validate_location)
            .transpose()?;

        self.require_product(&request.product_id).await?;
        self.require_warehouse(&request.warehouse_id).await?;

        let key = BalanceKey::new(&request.product_id, &request.warehouse_id);
        let _locks = self
            .locks
            .acquire([LockKey::from(key.clone())], deadline)
            .await?;

        let mut work = self.load(std::slice::from_ref(&key)).await?;
        let change = work.apply(&key, |state| state.plan_adjust(request.quantity_delta))?;
        if let Some(label) = location {
            work.set_location(&key, label);
        }

        let provenance = Provenance::new(ctx, reason, notes);
        let mut batch = LedgerBatch::new();
        batch.balances = work.writes(provenance.at);
        batch
            .movements
            .push(provenance.movement(&key, MovementType::Adjustment, &change));

        let mut movements = self.commit(batch).await?;
        let movement = movements.pop().ok_or_else(missing_movement)?;

        info!(
            key = %key,
            delta = request.quantity_delta,
            after = change.after.quantity,
            movement_id = movement.id,
            actor = %ctx.actor_id,
            "Stock adjusted"
        );

        Ok(AdjustOutcome {
            balance: work.snapshot(&key, provenance.at),
            movement,
        })
    }

    // =========================================================================
    // Transfer
    // =========================================================================

    /// Moves `quantity` from one warehouse to another as one atomic unit.
    ///
    /// Both movements or neither are written; the product's total across
    /// warehouses is unchanged.
    pub async fn transfer(
        &self,
        ctx: &RequestContext,
        request: TransferRequest,
    ) -> EngineResult<TransferOutcome> {
        let deadline = self.deadline(ctx);
        self.validate_context(ctx)?;
        validate_id("product_id", &request.product_id)?;
        validate_id("from_warehouse_id", &request.from_warehouse_id)?;
        validate_id("to_warehouse_id", &request.to_warehouse_id)?;
        validate_positive_quantity("quantity", request.quantity)?;
        let reason = self.checked_reason(&request.reason)?;
        let notes = validate_notes(request.notes.as_deref())?;

        if request.from_warehouse_id == request.to_warehouse_id {
            return Err(LedgerError::invalid_warehouse(
                &request.from_warehouse_id,
                "source and destination are the same warehouse",
            )
            .into());
        }

        self.require_product(&request.product_id).await?;
        self.require_warehouse(&request.from_warehouse_id).await?;
        self.require_warehouse(&request.to_warehouse_id).await?;

        let source = BalanceKey::new(&request.product_id, &request.from_warehouse_id);
        let destination = BalanceKey::new(&request.product_id, &request.to_warehouse_id);
        let _locks = self
            .locks
            .acquire(
                [LockKey::from(source.clone()), LockKey::from(destination.clone())],
                deadline,
            )
            .await?;

        let mut work = self.load(&[source.clone(), destination.clone()]).await?;
        let out = work.apply(&source, |state| state.plan_debit(request.quantity))?;
        let into = work.apply(&destination, |state| state.plan_credit(request.quantity))?;

        let correlation_id = Uuid::new_v4().to_string();
        let provenance = Provenance::new(ctx, reason, notes).correlated(&correlation_id);

        let mut batch = LedgerBatch::new();
        batch.balances = work.writes(provenance.at);
        batch
            .movements
            .push(provenance.movement(&source, MovementType::TransferOut, &out));
        batch
            .movements
            .push(provenance.movement(&destination, MovementType::TransferIn, &into));

        let movements = self.commit(batch).await?;

        info!(
            product_id = %request.product_id,
            from = %request.from_warehouse_id,
            to = %request.to_warehouse_id,
            quantity = request.quantity,
            correlation_id = %correlation_id,
            actor = %ctx.actor_id,
            "Stock transferred"
        );

        Ok(TransferOutcome {
            correlation_id,
            source: work.snapshot(&source, provenance.at),
            destination: work.snapshot(&destination, provenance.at),
            movements,
        })
    }

    // =========================================================================
    // Bin Location
    // =========================================================================

    /// Relabels the bin of a balance; a blank label clears it.
    ///
    /// Quantities are untouched, so no movement is written.
    pub async fn set_location(
        &self,
        ctx: &RequestContext,
        product_id: &str,
        warehouse_id: &str,
        label: &str,
    ) -> EngineResult<StockBalance> {
        let deadline = self.deadline(ctx);
        self.validate_context(ctx)?;
        validate_id("product_id", product_id)?;
        validate_id("warehouse_id", warehouse_id)?;
        let label = validate_location(label)?;

        self.require_product(product_id).await?;
        self.require_warehouse(warehouse_id).await?;

        let key = BalanceKey::new(product_id, warehouse_id);
        let _locks = self
            .locks
            .acquire([LockKey::from(key.clone())], deadline)
            .await?;

        let mut work = self.load(std::slice::from_ref(&key)).await?;
        work.set_location(&key, label);

        let now = Utc::now();
        let mut batch = LedgerBatch::new();
        batch.balances = work.writes(now);
        self.commit(batch).await?;

        info!(key = %key, actor = %ctx.actor_id, "Bin location updated");
        Ok(work.snapshot(&key, now))
    }

    // =========================================================================
    // Shared Helpers
    // =========================================================================

    pub(crate) fn deadline(&self, ctx: &RequestContext) -> Instant {
        let timeout = ctx
            .timeout
            .unwrap_or_else(|| self.config.locks.acquire_timeout());
        Instant::now() + timeout
    }

    pub(crate) fn validate_context(&self, ctx: &RequestContext) -> LedgerResult<()> {
        validate_id("actor_id", &ctx.actor_id)?;
        Ok(())
    }

    pub(crate) fn checked_reason(&self, reason: &str) -> LedgerResult<String> {
        let settings = &self.config.ledger;
        Ok(validate_reason(
            reason,
            settings.max_reason_len,
            settings.require_reason,
        )?)
    }

    pub(crate) async fn require_product(&self, product_id: &str) -> EngineResult<Product> {
        self.catalog
            .product(product_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Product", product_id).into())
    }

    /// The warehouse, if it exists and accepts stock.
    pub(crate) async fn require_warehouse(&self, warehouse_id: &str) -> EngineResult<Warehouse> {
        let warehouse = self
            .catalog
            .warehouse(warehouse_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Warehouse", warehouse_id))?;

        if !warehouse.is_active {
            warn!(warehouse_id, "Rejected operation on inactive warehouse");
            return Err(LedgerError::invalid_warehouse(warehouse_id, "warehouse is inactive").into());
        }

        Ok(warehouse)
    }

    /// Reads the current rows of `keys`. Call only while they are locked.
    pub(crate) async fn load(&self, keys: &[BalanceKey]) -> EngineResult<WorkingSet> {
        let balances = self.db.balances().get_many(keys).await?;
        Ok(WorkingSet::new(keys, balances))
    }

    /// Commits a batch and pairs each planned movement with its assigned id.
    pub(crate) async fn commit(&self, batch: LedgerBatch) -> EngineResult<Vec<MovementEntry>> {
        Ok(self.commit_with_receipt(batch).await?.0)
    }

    pub(crate) async fn commit_with_receipt(
        &self,
        batch: LedgerBatch,
    ) -> EngineResult<(Vec<MovementEntry>, Option<String>)> {
        let receipt = self.db.ledger().commit(&batch).await?;
        let entries = batch
            .movements
            .into_iter()
            .zip(receipt.movement_ids)
            .map(|(movement, id)| movement.into_entry(id))
            .collect();
        Ok((entries, receipt.receipt_number))
    }
}

pub(crate) fn missing_movement() -> crate::error::EngineError {
    depot_db::DbError::Internal("commit returned no movement id".into()).into()
}

// =============================================================================
// Working Set
// =============================================================================

/// Balances of the locked keys while an operation is being planned.
///
/// Plans apply in sequence, so two sale lines for the same product see each
/// other's effect; the write for a key always expects the row as it was read.
#[derive(Debug)]
pub(crate) struct WorkingSet {
    slots: BTreeMap<BalanceKey, Slot>,
}

#[derive(Debug)]
struct Slot {
    original: Option<StockBalance>,
    state: BalanceState,
    location: Option<Option<String>>,
}

impl Slot {
    /// A missing row only counts as changed once it holds something.
    fn changed(&self) -> bool {
        let quantities = match &self.original {
            Some(row) => BalanceState::from(row) != self.state,
            None => self.state != BalanceState::default(),
        };
        quantities || self.location.is_some()
    }
}

impl WorkingSet {
    fn new(keys: &[BalanceKey], balances: Vec<StockBalance>) -> Self {
        let mut slots: BTreeMap<BalanceKey, Slot> = keys
            .iter()
            .map(|key| {
                let slot = Slot {
                    original: None,
                    state: BalanceState::default(),
                    location: None,
                };
                (key.clone(), slot)
            })
            .collect();

        for balance in balances {
            let key = balance.key();
            let slot = Slot {
                state: BalanceState::from(&balance),
                original: Some(balance),
                location: None,
            };
            slots.insert(key, slot);
        }

        WorkingSet { slots }
    }

    /// Current planned state of a key.
    #[cfg(test)]
    pub(crate) fn state(&self, key: &BalanceKey) -> BalanceState {
        self.slots.get(key).map(|s| s.state).unwrap_or_default()
    }

    /// Runs a plan against the key's current state and keeps the result.
    pub(crate) fn apply(
        &mut self,
        key: &BalanceKey,
        plan: impl FnOnce(&BalanceState) -> PlanResult,
    ) -> LedgerResult<BalanceChange> {
        let slot = self.slots.entry(key.clone()).or_insert_with(|| Slot {
            original: None,
            state: BalanceState::default(),
            location: None,
        });

        match plan(&slot.state) {
            Ok(change) => {
                slot.state = change.after;
                Ok(change)
            }
            Err(rule) => {
                let err = rule.into_ledger_error(key);
                warn!(key = %key, error = %err, "Balance rule rejected operation");
                Err(err)
            }
        }
    }

    pub(crate) fn set_location(&mut self, key: &BalanceKey, label: Option<String>) {
        if let Some(slot) = self.slots.get_mut(key) {
            slot.location = Some(label);
        }
    }

    /// Guarded writes for every key whose row changes, stamped `at`.
    pub(crate) fn writes(&self, at: DateTime<Utc>) -> Vec<BalanceWrite> {
        self.slots
            .iter()
            .filter_map(|(key, slot)| {
                slot.changed().then(|| BalanceWrite {
                    key: key.clone(),
                    expected: slot.original.as_ref().map(BalanceState::from),
                    after: slot.state,
                    location: slot.location.clone(),
                    updated_at: at,
                })
            })
            .collect()
    }

    /// The row as it will read after the commit.
    pub(crate) fn snapshot(&self, key: &BalanceKey, at: DateTime<Utc>) -> StockBalance {
        let Some(slot) = self.slots.get(key) else {
            return StockBalance::empty(key);
        };

        let location = match &slot.location {
            Some(label) => label.clone(),
            None => slot.original.as_ref().and_then(|b| b.location.clone()),
        };
        let updated_at = match &slot.original {
            Some(original) if !slot.changed() => original.updated_at,
            _ => at,
        };

        StockBalance {
            product_id: key.product_id.clone(),
            warehouse_id: key.warehouse_id.clone(),
            quantity: slot.state.quantity,
            reserved_quantity: slot.state.reserved,
            location,
            updated_at,
        }
    }

    /// Snapshots of every key, in key order.
    pub(crate) fn snapshots(&self, at: DateTime<Utc>) -> Vec<StockBalance> {
        self.slots.keys().map(|key| self.snapshot(key, at)).collect()
    }
}

// =============================================================================
// Provenance
// =============================================================================

/// Who, why and when, shared by every movement of one operation.
#[derive(Debug, Clone)]
pub(crate) struct Provenance {
    pub reason: String,
    pub notes: Option<String>,
    pub actor_id: String,
    pub correlation_id: Option<String>,
    pub reference_id: Option<String>,
    pub at: DateTime<Utc>,
}

impl Provenance {
    pub(crate) fn new(ctx: &RequestContext, reason: String, notes: Option<String>) -> Self {
        Provenance {
            reason,
            notes,
            actor_id: ctx.actor_id.clone(),
            correlation_id: None,
            reference_id: None,
            at: Utc::now(),
        }
    }

    pub(crate) fn correlated(mut self, correlation_id: &str) -> Self {
        self.correlation_id = Some(correlation_id.to_string());
        self
    }

    pub(crate) fn referencing(mut self, reference_id: &str) -> Self {
        self.reference_id = Some(reference_id.to_string());
        self
    }

    pub(crate) fn movement(
        &self,
        key: &BalanceKey,
        movement_type: MovementType,
        change: &BalanceChange,
    ) -> NewMovement {
        NewMovement {
            key: key.clone(),
            movement_type,
            quantity_delta: change.quantity_delta(),
            balance_before: change.before.quantity,
            balance_after: change.after.quantity,
            reason: self.reason.clone(),
            notes: self.notes.clone(),
            actor_id: self.actor_id.clone(),
            correlation_id: self.correlation_id.clone(),
            reference_id: self.reference_id.clone(),
            occurred_at: self.at,
        }
    }
}
