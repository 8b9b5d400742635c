//! # Balance Arithmetic
//!
//! Pure planning of balance changes. The engine reads the current
//! [`BalanceState`] under the key lock, asks for a plan, and persists the
//! resulting [`BalanceChange`] together with its movement entry.
//!
//! ## Rules Enforced Here
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  quantity ≥ 0                  no plan may end below zero              │
//! │  0 ≤ reserved ≤ quantity       removals only take *available* stock    │
//! │  delta ≠ 0                     zero adjustments are rejected           │
//! │  |value| ≤ MAX_QUANTITY        sums never approach i64 overflow        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::types::{BalanceKey, MovementEntry, StockBalance};
use crate::MAX_QUANTITY;

/// The two mutable numbers of a balance row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BalanceState {
    pub quantity: i64,
    pub reserved: i64,
}

/// Before/after pair produced by a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceChange {
    pub before: BalanceState,
    pub after: BalanceState,
}

impl BalanceChange {
    /// Signed change to on-hand quantity.
    #[inline]
    pub fn quantity_delta(&self) -> i64 {
        self.after.quantity - self.before.quantity
    }

    /// Signed change to reserved quantity.
    #[inline]
    pub fn reserved_delta(&self) -> i64 {
        self.after.reserved - self.before.reserved
    }
}

/// Why a plan was refused. Carries no key; see [`BalanceRule::into_ledger_error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceRule {
    /// Not enough available (or reserved) stock.
    Shortfall { available: i64, requested: i64 },
    /// Zero or negative amount passed where a positive one is needed.
    NonPositive { requested: i64 },
    /// Amount or result exceeds [`MAX_QUANTITY`].
    TooLarge { requested: i64 },
}

impl BalanceRule {
    pub fn into_ledger_error(self, key: &BalanceKey) -> LedgerError {
        match self {
            BalanceRule::Shortfall {
                available,
                requested,
            } => LedgerError::InsufficientStock {
                product_id: key.product_id.clone(),
                warehouse_id: key.warehouse_id.clone(),
                available,
                requested,
            },
            BalanceRule::NonPositive { requested } | BalanceRule::TooLarge { requested } => {
                LedgerError::invalid_quantity("quantity", requested)
            }
        }
    }
}

pub type PlanResult = Result<BalanceChange, BalanceRule>;

impl BalanceState {
    pub const fn new(quantity: i64, reserved: i64) -> Self {
        BalanceState { quantity, reserved }
    }

    /// On hand minus reserved.
    #[inline]
    pub const fn available(&self) -> i64 {
        self.quantity - self.reserved
    }

    fn change(self, after: BalanceState) -> BalanceChange {
        BalanceChange {
            before: self,
            after,
        }
    }

    /// Signed adjustment: positive adds stock, negative removes available stock.
    pub fn plan_adjust(&self, delta: i64) -> PlanResult {
        if delta == 0 {
            return Err(BalanceRule::NonPositive { requested: 0 });
        }
        if delta > 0 {
            self.plan_credit(delta)
        } else {
            let requested = delta.checked_neg().ok_or(BalanceRule::TooLarge { requested: delta })?;
            self.plan_debit(requested)
        }
    }

    /// Adds `qty` to on-hand quantity.
    pub fn plan_credit(&self, qty: i64) -> PlanResult {
        check_amount(qty)?;
        let quantity = self
            .quantity
            .checked_add(qty)
            .filter(|q| *q <= MAX_QUANTITY)
            .ok_or(BalanceRule::TooLarge { requested: qty })?;
        Ok(self.change(BalanceState::new(quantity, self.reserved)))
    }

    /// Removes `qty` of *available* stock (reservations are untouchable).
    pub fn plan_debit(&self, qty: i64) -> PlanResult {
        check_amount(qty)?;
        if self.available() < qty {
            return Err(BalanceRule::Shortfall {
                available: self.available().max(0),
                requested: qty,
            });
        }
        Ok(self.change(BalanceState::new(self.quantity - qty, self.reserved)))
    }

    /// Earmarks `qty` of available stock for an open sale.
    pub fn plan_reserve(&self, qty: i64) -> PlanResult {
        check_amount(qty)?;
        if self.available() < qty {
            return Err(BalanceRule::Shortfall {
                available: self.available().max(0),
                requested: qty,
            });
        }
        Ok(self.change(BalanceState::new(self.quantity, self.reserved + qty)))
    }

    /// Returns `qty` of reserved stock to available.
    pub fn plan_release(&self, qty: i64) -> PlanResult {
        check_amount(qty)?;
        if self.reserved < qty {
            return Err(BalanceRule::Shortfall {
                available: self.reserved,
                requested: qty,
            });
        }
        Ok(self.change(BalanceState::new(self.quantity, self.reserved - qty)))
    }

    /// Deducts `qty` that was previously reserved by the same sale.
    pub fn plan_fulfil(&self, qty: i64) -> PlanResult {
        check_amount(qty)?;
        if self.reserved < qty || self.quantity < qty {
            return Err(BalanceRule::Shortfall {
                available: self.reserved.min(self.quantity),
                requested: qty,
            });
        }
        Ok(self.change(BalanceState::new(self.quantity - qty, self.reserved - qty)))
    }
}

impl From<&StockBalance> for BalanceState {
    fn from(balance: &StockBalance) -> Self {
        BalanceState::new(balance.quantity, balance.reserved_quantity)
    }
}

fn check_amount(qty: i64) -> Result<(), BalanceRule> {
    if qty <= 0 {
        return Err(BalanceRule::NonPositive { requested: qty });
    }
    if qty > MAX_QUANTITY {
        return Err(BalanceRule::TooLarge { requested: qty });
    }
    Ok(())
}

// =============================================================================
// Movement Log Checks
// =============================================================================

/// Sum of all deltas: what the balance must equal.
pub fn reconstruct_quantity<'a>(entries: impl IntoIterator<Item = &'a MovementEntry>) -> i64 {
    entries.into_iter().map(|e| e.quantity_delta).sum()
}

/// Where a per-key movement chain stopped adding up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainBreak {
    pub movement_id: i64,
    pub expected_before: i64,
    pub actual_before: i64,
}

/// Verifies one key's totally-ordered history.
///
/// Each entry's `balance_before` must equal the previous `balance_after`
/// (zero for the first), and `balance_after - balance_before` must equal
/// its delta. Returns the final balance.
pub fn verify_chain<'a>(
    entries: impl IntoIterator<Item = &'a MovementEntry>,
) -> Result<i64, ChainBreak> {
    let mut running = 0i64;
    for entry in entries {
        if entry.balance_before != running
            || entry.balance_after - entry.balance_before != entry.quantity_delta
        {
            return Err(ChainBreak {
                movement_id: entry.id,
                expected_before: running,
                actual_before: entry.balance_before,
            });
        }
        running = entry.balance_after;
    }
    Ok(running)
}

// =============================================================================
// Unit Tests
// =============================================================================
