//! # depot-db: Persistence for the Depot Stock Ledger
//!
//! SQLite storage via sqlx: the balance store, the append-only movement
//! log, sales, and the master data the ledger reads.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Depot Data Flow                                  │
//! │                                                                         │
//! │  depot-engine: Ledger::transfer(..)                                    │
//! │       │  locks (P1,W1) (P1,W2), reads, plans a LedgerBatch             │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     depot-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │  balance      │    │  (embedded)  │  │   │
//! │  │   │               │◄───│  movement     │    │              │  │   │
//! │  │   │ SqlitePool    │    │  sale, po     │    │ 0001_ledger  │  │   │
//! │  │   │               │    │  ledger ◄─ the only writer       │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL)                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`pool`] - Connection pool management
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Readers and the batch writer
//!
//! ## Usage
//!
//! ```rust,ignore
//! use depot_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./depot.db")).await?;
//! let history = db.movements().history(&BalanceKey::new("P1", "W1")).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use migrations::MigrationStatus;
pub use pool::{Database, DbConfig};

pub use repository::balance::BalanceRepository;
pub use repository::catalog::{CatalogRepository, NewProduct};
pub use repository::ledger::{
    BalanceWrite, CommitReceipt, LedgerBatch, LedgerWriter, OrderLineWrite, SaleInsert,
    SaleTransition,
};
pub use repository::movement::{BalanceDrift, MovementRepository};
pub use repository::purchase_order::PurchaseOrderRepository;
pub use repository::sale::SaleRepository;
