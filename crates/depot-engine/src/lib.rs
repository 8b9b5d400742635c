//! # depot-engine: Transaction Coordinator for Depot
//!
//! The in-process API for every stock change. Callers (an HTTP layer, a
//! desktop shell, a batch job) hand it plain requests plus a
//! [`RequestContext`]; it locks, validates, plans and commits.
//!
//! ## Module Organization
//! ```text
//! depot_engine/
//! ├── lib.rs          ◄─── You are here (exports, tracing setup)
//! ├── coordinator.rs  ◄─── Ledger, RequestContext, adjust / transfer / set_location
//! ├── sales.rs        ◄─── record / hold / complete / release / void
//! ├── receiving.rs    ◄─── purchase-order receipts
//! ├── queries.rs      ◄─── availability, low stock, audit, reconciliation
//! ├── locks.rs        ◄─── per-key lock manager
//! ├── catalog.rs      ◄─── master-data seam (products, warehouses, orders)
//! ├── config.rs       ◄─── EngineConfig (TOML + env)
//! └── error.rs        ◄─── EngineError, ApiError
//! ```
//!
//! ## Concurrency Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  worker A: sale P1×1 @W1 ──► lock P1@W1 ──► read 1 ──► commit 0        │
//! │  worker B: sale P1×1 @W1 ──► wait P1@W1 ──────────────► read 0         │
//! │                                                 InsufficientStock ◄──┘ │
//! │  worker C: adjust P2 @W1 ──► lock P2@W1 (independent, runs at once)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! use depot_engine::{AdjustRequest, EngineConfig, Ledger, RequestContext};
//!
//! let ledger = Ledger::open(EngineConfig::load(None)?).await?;
//! let ctx = RequestContext::new("clerk-17");
//! let outcome = ledger
//!     .adjust(&ctx, AdjustRequest::new("P1", "W1", -6, "damage"))
//!     .await?;
//! assert_eq!(outcome.movement.quantity_delta, -6);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod locks;
pub mod queries;
pub mod receiving;
pub mod sales;

// =============================================================================
// Re-exports
// =============================================================================

pub use catalog::{Catalog, SqliteCatalog};
pub use config::EngineConfig;
pub use coordinator::{
    AdjustOutcome, AdjustRequest, Ledger, RequestContext, TransferOutcome, TransferRequest,
};
pub use error::{ApiError, EngineError, EngineResult};
pub use locks::{LockKey, LockManager, LockSet};
pub use queries::{ChainVerification, ReconciliationReport, SaleDetail};
pub use receiving::{OrderReceiptOutcome, ReceiptOutcome, ReceiveRequest};
pub use sales::{SaleLineRequest, SaleOutcome, SaleRequest};

use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber for a binary.
///
/// Libraries never call this. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,depot=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
