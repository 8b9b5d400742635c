//! # Storage Errors
//!
//! ```text
//! sqlx::Error ──► DbError ──► EngineError::Database ──► ApiError (generic text)
//!                    │
//!                    └── StaleWrite: a guarded ledger write found a row that
//!                        was not the one the batch was planned against
//! ```
//!
//! SQLite reports constraint and locking failures only as message text, so
//! classification goes by message prefix.

use thiserror::Error;

/// Storage failures below the ledger rules.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Duplicate SKU, warehouse code or receipt number.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// CHECK or foreign key constraint failed.
    ///
    /// The schema's CHECK constraints mirror the ledger invariants
    /// (`quantity >= 0`, `reserved <= quantity`, `received <= ordered`),
    /// so reaching this means a rule was bypassed above the database.
    #[error("Constraint violation: {message}")]
    ConstraintViolation { message: String },

    /// A guarded write matched no row: the stored state was not the state
    /// the batch was planned against. The whole batch is rolled back.
    #[error("Stale write on {entity} {id}")]
    StaleWrite { entity: String, id: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed, or the schema is missing ledger tables.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Another writer held the SQLite write lock past `busy_timeout`.
    #[error("Database busy: {0}")]
    Busy(String),

    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn stale(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::StaleWrite {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),
            sqlx::Error::Database(db_err) => classify_sqlite_message(db_err.message()),
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),
            _ => DbError::Internal(err.to_string()),
        }
    }
}

/// Maps a SQLite error message to the matching variant.
fn classify_sqlite_message(msg: &str) -> DbError {
    // "UNIQUE constraint failed: <table>.<column>"
    if let Some(field) = msg.strip_prefix("UNIQUE constraint failed: ") {
        return DbError::duplicate(field, "unknown");
    }

    let constraint = ["CHECK constraint failed", "FOREIGN KEY constraint failed", "append-only"];
    if constraint.iter().any(|needle| msg.contains(needle)) {
        return DbError::ConstraintViolation {
            message: msg.to_string(),
        };
    }

    if msg.contains("database is locked") || msg.contains("database is busy") {
        return DbError::Busy(msg.to_string());
    }

    DbError::QueryFailed(msg.to_string())
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
