//! # Schema Migrations
//!
//! The ledger schema ships inside the binary (`migrations/sqlite/*.sql`,
//! embedded by `sqlx::migrate!`).
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DbConfig.run_migrations = true     apply pending files, in order      │
//! │  DbConfig.run_migrations = false    verify_schema: every ledger table  │
//! │                                     must already exist, else fail      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Applied files are checksummed by sqlx; edit history by adding
//! `NNNN_description.sql`, never by changing a shipped file.

use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Tables the ledger cannot run without.
pub const LEDGER_TABLES: &[&str] = &[
    "stock_balances",
    "stock_movements",
    "sales",
    "sale_lines",
    "receipt_sequences",
    "products",
    "warehouses",
    "purchase_orders",
    "purchase_order_lines",
];

/// Embedded vs applied migration counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationStatus {
    pub embedded: usize,
    pub applied: usize,
}

impl MigrationStatus {
    pub fn is_current(&self) -> bool {
        self.applied >= self.embedded
    }

    pub fn pending(&self) -> usize {
        self.embedded.saturating_sub(self.applied)
    }
}

/// Applies every embedded migration not yet recorded in `_sqlx_migrations`.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    let before = migration_status(pool).await?;
    if before.is_current() {
        debug!(applied = before.applied, "Ledger schema is current");
        return Ok(());
    }

    info!(pending = before.pending(), "Applying ledger migrations");
    MIGRATOR.run(pool).await?;
    info!(embedded = before.embedded, "Ledger schema migrated");
    Ok(())
}

pub async fn migration_status(pool: &SqlitePool) -> DbResult<MigrationStatus> {
    let tracked: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
    )
    .fetch_one(pool)
    .await?;

    let applied: i64 = if tracked == 0 {
        0
    } else {
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await?
    };

    Ok(MigrationStatus {
        embedded: MIGRATOR.migrations.len(),
        applied: usize::try_from(applied).unwrap_or(0),
    })
}

/// Fails with the names of any ledger tables that are missing.
pub async fn verify_schema(pool: &SqlitePool) -> DbResult<()> {
    let present: Vec<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table'")
            .fetch_all(pool)
            .await?;

    let missing: Vec<&str> = LEDGER_TABLES
        .iter()
        .copied()
        .filter(|table| !present.iter().any(|name| name == table))
        .collect();

    if missing.is_empty() {
        return Ok(());
    }

    warn!(missing = ?missing, "Ledger schema incomplete");
    Err(DbError::MigrationFailed(format!(
        "ledger tables missing: {}",
        missing.join(", ")
    )))
}
