//! # Repository Module
//!
//! Database repository implementations for the Depot ledger.
//!
//! ## Read / Write Split
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repositories                                         │
//! │                                                                         │
//! │  Readers (pool, no transaction)        Writer (one transaction)        │
//! │  ──────────────────────────────        ─────────────────────────        │
//! │  BalanceRepository                     LedgerWriter::commit(batch)      │
//! │  MovementRepository                    ├── guarded balance upserts      │
//! │  SaleRepository                        ├── movement appends             │
//! │  PurchaseOrderRepository               ├── sale insert / transition     │
//! │  CatalogRepository                     └── order line + order status    │
//! │                                                                         │
//! │  Ledger state changes only through LedgerWriter. Readers may observe   │
//! │  concurrently advancing values.                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod balance;
pub mod catalog;
pub mod ledger;
pub mod movement;
pub mod purchase_order;
pub mod sale;
