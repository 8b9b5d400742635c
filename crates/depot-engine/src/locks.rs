//! # Key Lock Manager
//!
//! Per-key exclusive locks that serialize every mutation of a balance, a
//! sale, or a purchase order.
//!
//! ## Acquisition
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Lock Acquisition                                     │
//! │                                                                         │
//! │  transfer P1: W2 → W1          transfer P1: W1 → W2                     │
//! │       │                              │                                  │
//! │       ▼ sort + dedup                 ▼ sort + dedup                     │
//! │  [P1@W1, P1@W2]                 [P1@W1, P1@W2]    same order, no cycle  │
//! │       │                              │                                  │
//! │       ▼                              ▼                                  │
//! │  lock P1@W1 ─► lock P1@W2       waits on P1@W1 until deadline           │
//! │                                      │                                  │
//! │                                      ▼                                  │
//! │                    deadline passed → drop held guards → Timeout         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Guards live in a [`LockSet`]; dropping it releases every key at once.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;
use tokio::time::Instant;
use tracing::{debug, warn};

use depot_core::{BalanceKey, LedgerError, LedgerResult};

/// Idle entries are pruned once the table grows past this size.
const PRUNE_THRESHOLD: usize = 1024;

// =============================================================================
// Lock Key
// =============================================================================

/// Something that can be locked.
///
/// The derived `Ord` is the global acquisition order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockKey {
    /// A (product, warehouse) balance row.
    Balance(BalanceKey),
    /// A sale's status.
    Sale(String),
    /// A purchase order and all of its lines.
    Order(String),
}

impl LockKey {
    pub fn balance(product_id: impl Into<String>, warehouse_id: impl Into<String>) -> Self {
        LockKey::Balance(BalanceKey::new(product_id, warehouse_id))
    }
}

impl From<BalanceKey> for LockKey {
    fn from(key: BalanceKey) -> Self {
        LockKey::Balance(key)
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockKey::Balance(key) => write!(f, "balance {}", key),
            LockKey::Sale(id) => write!(f, "sale {}", id),
            LockKey::Order(id) => write!(f, "order {}", id),
        }
    }
}

// =============================================================================
// Lock Set
// =============================================================================

/// Guards for every key of one operation, released together on drop.
#[derive(Debug)]
pub struct LockSet {
    keys: Vec<LockKey>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl LockSet {
    /// Locked keys in acquisition order.
    pub fn keys(&self) -> &[LockKey] {
        &self.keys
    }
}

// =============================================================================
// Lock Manager
// =============================================================================

/// Table of per-key async mutexes.
///
/// The table itself sits behind a short-lived `std` mutex that is never held
/// across an `.await`.
#[derive(Debug, Default)]
pub struct LockManager {
    locks: Mutex<HashMap<LockKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks every key, in sorted order, before `deadline`.
    ///
    /// ## Returns
    /// * `Ok(LockSet)` - all keys held
    /// * `Err(LedgerError::Timeout)` - a key was still busy at the deadline;
    ///   nothing is held
    pub async fn acquire(
        &self,
        keys: impl IntoIterator<Item = LockKey>,
        deadline: Instant,
    ) -> LedgerResult<LockSet> {
        let mut keys: Vec<LockKey> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();

        let handles = self.handles(&keys);
        let started = Instant::now();
        let mut guards = Vec::with_capacity(handles.len());

        for (key, handle) in keys.iter().zip(handles) {
            match tokio::time::timeout_at(deadline, handle.lock_owned()).await {
                Ok(guard) => guards.push(guard),
                Err(_) => {
                    let waited_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                    drop(guards);
                    warn!(key = %key, waited_ms, "Lock acquisition timed out");
                    return Err(LedgerError::Timeout {
                        key: key.to_string(),
                        waited_ms,
                    });
                }
            }
        }

        debug!(keys = keys.len(), "Locks acquired");
        Ok(LockSet {
            keys,
            _guards: guards,
        })
    }

    /// Number of keys currently in the table (held or idle).
    pub fn tracked(&self) -> usize {
        self.table().len()
    }

    fn handles(&self, keys: &[LockKey]) -> Vec<Arc<tokio::sync::Mutex<()>>> {
        let mut table = self.table();

        if table.len() > PRUNE_THRESHOLD {
            // Only the table references an idle entry.
            table.retain(|_, lock| Arc::strong_count(lock) > 1);
        }

        keys.iter()
            .map(|key| Arc::clone(table.entry(key.clone()).or_default()))
            .collect()
    }

    fn table(&self) -> std::sync::MutexGuard<'_, HashMap<LockKey, Arc<tokio::sync::Mutex<()>>>> {
        self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn soon(ms: u64) -> Instant {
        Instant::now() + Duration::from_millis(ms)
    }

    #[tokio::test]
    async fn test_keys_sorted_and_deduplicated() {
        let manager = LockManager::new();
        let set = manager
            .acquire(
                [
                    LockKey::balance("P2", "W1"),
                    LockKey::Sale("S1".into()),
                    LockKey::balance("P1", "W2"),
                    LockKey::balance("P2", "W1"),
                ],
                soon(100),
            )
            .await
            .unwrap();

        assert_eq!(
            set.keys(),
            &[
                LockKey::balance("P1", "W2"),
                LockKey::balance("P2", "W1"),
                LockKey::Sale("S1".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_busy_key_times_out_and_releases_others() {
        let manager = LockManager::new();
        let held = manager
            .acquire([LockKey::balance("P1", "W2")], soon(100))
            .await
            .unwrap();

        let err = manager
            .acquire(
                [LockKey::balance("P1", "W1"), LockKey::balance("P1", "W2")],
                soon(50),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Timeout { ref key, .. } if key == "balance P1@W2"));

        // P1@W1 was taken first and must have been released.
        let free = manager.acquire([LockKey::balance("P1", "W1")], soon(10)).await;
        assert!(free.is_ok());
        drop(held);
    }

    #[tokio::test]
    async fn test_release_on_drop() {
        let manager = LockManager::new();
        let key = LockKey::Order("O1".into());

        let first = manager.acquire([key.clone()], soon(50)).await.unwrap();
        drop(first);

        assert!(manager.acquire([key], soon(50)).await.is_ok());
    }

    #[tokio::test]
    async fn test_elapsed_deadline_still_takes_free_lock() {
        let manager = LockManager::new();
        let past = Instant::now();
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(manager.acquire([LockKey::Sale("S1".into())], past).await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_opposite_order_requests_do_not_deadlock() {
        let manager = Arc::new(LockManager::new());
        let mut tasks = Vec::new();

        for i in 0..20 {
            let manager = Arc::clone(&manager);
            tasks.push(tokio::spawn(async move {
                let (a, b) = if i % 2 == 0 { ("W1", "W2") } else { ("W2", "W1") };
                let _set = manager
                    .acquire(
                        [LockKey::balance("P1", a), LockKey::balance("P1", b)],
                        soon(5_000),
                    )
                    .await?;
                tokio::task::yield_now().await;
                Ok::<_, LedgerError>(())
            }));
        }

        for task in tasks {
            task.await.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn test_idle_entries_are_pruned() {
        let manager = LockManager::new();
        for i in 0..=PRUNE_THRESHOLD {
            let set = manager
                .acquire([LockKey::Sale(format!("S{i}"))], soon(50))
                .await
                .unwrap();
            drop(set);
        }
        assert_eq!(manager.tracked(), PRUNE_THRESHOLD + 1);

        let _held = manager
            .acquire([LockKey::Sale("fresh".into())], soon(50))
            .await
            .unwrap();
        assert_eq!(manager.tracked(), 1);
    }
}
