//! # Engine Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     DEPOT_DB_PATH=/srv/depot/depot.db                                   │
//! │     DEPOT_LOCK_TIMEOUT_MS=2000                                          │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/depot/depot.toml (Linux)                                 │
//! │     ~/Library/Application Support/com.depot.depot/depot.toml (macOS)   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/srv/depot/depot.db"
//! max_connections = 5
//! busy_timeout_ms = 5000
//!
//! [locks]
//! acquire_timeout_ms = 5000
//!
//! [ledger]
//! max_reason_len = 500
//! require_reason = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use depot_core::DEFAULT_MAX_REASON_LEN;
use depot_db::DbConfig;

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file; `:memory:` for a throwaway database.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a writer waits on the SQLite write lock.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("com", "depot", "depot")
        .map(|dirs| dirs.data_dir().join("depot.db"))
        .unwrap_or_else(|| PathBuf::from("./depot.db"))
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout() -> u64 {
    5000
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

// =============================================================================
// Lock Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockSettings {
    /// Default deadline for acquiring every key lock of one operation.
    /// A [`RequestContext`](crate::RequestContext) timeout overrides it.
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_ms: u64,
}

fn default_acquire_timeout() -> u64 {
    5000
}

impl Default for LockSettings {
    fn default() -> Self {
        LockSettings {
            acquire_timeout_ms: default_acquire_timeout(),
        }
    }
}

impl LockSettings {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

// =============================================================================
// Ledger Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSettings {
    #[serde(default = "default_max_reason_len")]
    pub max_reason_len: usize,

    /// Reject adjustments, transfers and voids without a reason.
    #[serde(default = "default_true")]
    pub require_reason: bool,
}

fn default_max_reason_len() -> usize {
    DEFAULT_MAX_REASON_LEN
}

fn default_true() -> bool {
    true
}

impl Default for LedgerSettings {
    fn default() -> Self {
        LedgerSettings {
            max_reason_len: default_max_reason_len(),
            require_reason: true,
        }
    }
}

// =============================================================================
// Engine Configuration
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub locks: LockSettings,

    #[serde(default)]
    pub ledger: LedgerSettings,
}

impl EngineConfig {
    /// Defaults with an in-memory database.
    pub fn in_memory() -> Self {
        let mut config = Self::default();
        config.database.path = PathBuf::from(":memory:");
        config
    }

    /// Loads configuration: defaults → file → environment → validation.
    ///
    /// A missing file is not an error.
    pub fn load(config_path: Option<PathBuf>) -> EngineResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)
                    .map_err(|e| EngineError::Config(format!("{}: {}", path.display(), e)))?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parses a TOML document; absent sections take their defaults.
    pub fn from_toml(contents: &str) -> EngineResult<Self> {
        toml::from_str(contents).map_err(|e| EngineError::Config(e.to_string()))
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.database.max_connections == 0 {
            return Err(EngineError::Config(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.locks.acquire_timeout_ms == 0 {
            return Err(EngineError::Config(
                "locks.acquire_timeout_ms must be greater than 0".into(),
            ));
        }

        if self.ledger.max_reason_len == 0 {
            return Err(EngineError::Config(
                "ledger.max_reason_len must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// The pool configuration derived from `[database]`.
    pub fn db_config(&self) -> DbConfig {
        let busy = Duration::from_millis(self.database.busy_timeout_ms);
        let base = if self.database.path.as_os_str() == ":memory:" {
            DbConfig::in_memory()
        } else {
            DbConfig::new(&self.database.path).max_connections(self.database.max_connections)
        };
        base.busy_timeout(busy)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("DEPOT_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(max) = lookup("DEPOT_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %max, "Ignoring invalid DEPOT_MAX_CONNECTIONS"),
            }
        }

        if let Some(timeout) = lookup("DEPOT_LOCK_TIMEOUT_MS") {
            match timeout.parse::<u64>() {
                Ok(ms) => self.locks.acquire_timeout_ms = ms,
                Err(_) => warn!(value = %timeout, "Ignoring invalid DEPOT_LOCK_TIMEOUT_MS"),
            }
        }

        if let Some(required) = lookup("DEPOT_REQUIRE_REASON") {
            match required.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.ledger.require_reason = true,
                "0" | "false" | "no" => self.ledger.require_reason = false,
                _ => warn!(value = %required, "Ignoring invalid DEPOT_REQUIRE_REASON"),
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "depot", "depot")
            .map(|dirs| dirs.config_dir().join("depot.toml"))
    }
}
